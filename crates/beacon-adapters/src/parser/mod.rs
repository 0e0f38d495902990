mod alertmanager;
mod manual;

pub use alertmanager::AlertmanagerParser;
pub use manual::ManualParser;
