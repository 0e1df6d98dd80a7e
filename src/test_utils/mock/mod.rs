mod mock_launchers;

pub use mock_launchers::*;
