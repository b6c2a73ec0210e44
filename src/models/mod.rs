// Domain models

mod alert;
mod device;
mod metric;
mod scan;

pub use alert::{ActiveAlert, Alert, AlertCounts, Severity, Trigger, TriggerOp};
pub use device::{
    Classification, Credentials, Device, DeviceRecord, DeviceType, DiskInfo, NicInfo,
    ONLINE_CUTOFF_MINUTES, PrinterDetail, PrinterSupply, ShareInfo, WindowsDetail,
};
pub use metric::MetricSample;
pub use scan::{
    IpMap, IpMapEntry, IpMapStats, IpStatus, LastResults, ScanLogEntry, ScanStatus, SweepHost,
};
