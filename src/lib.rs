//! Cyberwave Camera Driver Library
//!
//! Edge driver that streams a USB or depth camera feed to a Cyberwave
//! digital twin. It runs inside a container started by the edge
//! orchestrator, which injects the twin identity, an API token and a twin
//! metadata file through the environment.
//!
//! # Architecture
//!
//! ```text
//! config ──► supervisor ──► capture (worker thread) ──► publish (HTTP)
//!                │                                          │
//!                └──────────── retry / backoff ◄────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Fail fast on configuration**: bad metadata never touches a device
//! - **One owner**: the supervisor owns the device and the session and is
//!   the only place retry decisions are made
//! - **Monotonic numbering**: frame sequence numbers continue across device
//!   reopen and session reconnect
//! - **Scoped release**: the device and session are closed on every exit
//!   path
//!
//! # Example
//!
//! ```no_run
//! use camera_driver::{
//!     capture::SyntheticSource,
//!     config::ConfigLoader,
//!     publish::HttpConnector,
//!     shutdown::ShutdownSignal,
//!     supervisor::Supervisor,
//! };
//! use std::sync::Arc;
//!
//! let config = ConfigLoader::from_process_env()
//!     .verify_devices(false)
//!     .load()
//!     .unwrap();
//! let connector = HttpConnector::new(&config).unwrap();
//! let shutdown = ShutdownSignal::new();
//! shutdown.install_handler().unwrap();
//!
//! let mut supervisor = Supervisor::new(
//!     &config.settings,
//!     Arc::new(SyntheticSource::new(config.is_depth_camera)),
//!     connector,
//!     shutdown,
//! );
//! let stats = supervisor.run().unwrap();
//! println!("published {} frames", stats.frames_published);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod error;
pub mod metrics;
pub mod publish;
pub mod shutdown;
pub mod supervisor;

// Re-export commonly used types at crate root
pub use capture::{Camera, CameraSource, DeviceError, DeviceHandle, Frame};
pub use config::{ConfigError, ConfigLoader, DriverConfig, DriverSettings};
pub use error::{Diagnostic, DriverError};
pub use publish::{HttpConnector, PublishError, Publisher};
pub use shutdown::ShutdownSignal;
pub use supervisor::{StreamStats, Supervisor, SupervisorState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
