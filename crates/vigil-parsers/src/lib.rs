mod error;
pub use error::{ParserError, ParserResult};

mod file;
pub use file::{ReportFile, ReportFormat};

mod registry;
pub use registry::{ParserRegistry, ReportParser};

mod cvss;
mod date;
mod text;

mod aqua;
pub use aqua::AquaParser;

mod cyclonedx;
pub use cyclonedx::CycloneDxParser;

mod generic;
pub use generic::GenericParser;

mod openvas;
pub use openvas::OpenVasParser;

mod twistlock;
pub use twistlock::TwistlockParser;
