/* 📖 # Why have swagdoc_base as a core library?
swagdoc_base provides the error type, tracing setup and the platform abstraction layer
(filesystem and HTTP) shared by the engine and the CLI.
Keeping them here keeps the engine free of direct std::fs and socket code.
*/

pub mod error;
pub mod pal;
pub mod tracing;

pub use error::{ErrorKind, ResultExt, SwagdocError, SwagdocResult};
pub use pal::{FilePath, MockPal, Pal, PalHandle, RealPal};
