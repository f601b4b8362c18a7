//! The narrow interface the session drives the radio through.

use uuid::Uuid;

use crate::core::bluetooth::{PowerState, WriteTarget};

/// Central-role operations of the short-range wireless link.
///
/// No method blocks. Results are delivered asynchronously as
/// [`TransportEvent`](crate::core::bluetooth::TransportEvent)s on the channel
/// the implementation was constructed with. Devices are addressed by the
/// identifier reported in their advertisement.
pub trait Transport: Send + 'static {
    fn power_state(&self) -> PowerState;

    /// Starts a discovery pass. `None` scans without a service filter.
    /// Several passes may run at once until [`Transport::stop_scan`].
    fn start_scan(&mut self, service_filter: Option<Uuid>);

    /// Stops every running discovery pass.
    fn stop_scan(&mut self);

    fn connect(&mut self, device_id: &str);

    fn disconnect(&mut self, device_id: &str);

    fn discover_services(&mut self, device_id: &str, service: Uuid);

    fn discover_characteristics(&mut self, device_id: &str, service: Uuid, characteristic: Uuid);

    /// Writes with response. The acknowledgement echoes `tag`.
    fn write(&mut self, target: &WriteTarget, payload: Vec<u8>, tag: u64);

    fn set_notify(&mut self, target: &WriteTarget, enabled: bool);

    /// Resolves once the work started by earlier calls has reached the radio.
    /// Awaited when the session stops, so a final disconnect is not lost.
    fn settle(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}
