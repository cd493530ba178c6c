/* 📖 # What is the Platform Abstraction Layer?

Everything that touches the outside world goes through the `Pal` trait: reading controller files,
listing directories, loading templates and serving HTTP. Engine code only ever sees `PalHandle`,
so tests swap in `MockPal` and drive requests with `simulate_request`.
*/

mod file_path;
pub mod http;
pub mod mock;
pub mod real_pal;
mod traits;

pub use file_path::FilePath;
pub use mock::MockPal;
pub use real_pal::RealPal;
pub use traits::{Pal, PalHandle, ReadSeek};
