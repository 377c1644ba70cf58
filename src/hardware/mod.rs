pub mod media_device;
pub mod mock;

pub use media_device::{guard_seek, DeviceFactory, DeviceStatus, MediaDevice, MediaResult};
pub use mock::{DeviceCall, DeviceProbe, SimulatedDeviceFactory, SimulatedDeviceSettings, SimulatedMediaDevice};
