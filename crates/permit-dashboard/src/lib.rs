//! Local exploration dashboard for building-permit datasets.
//!
//! An axum server with four pages (overview, univariate, bivariate and
//! exploration) plus the raw column profile. Every API request re-reads the
//! chosen dataset with [`permit_processing::DatasetLoader`], builds a JSON
//! page model and drops the table again; nothing is cached between requests.
//! Charts travel as [`figure::Figure`] specs that the HTML shells hand to
//! Plotly.
//!
//! ```rust,ignore
//! use permit_dashboard::{DashboardState, server};
//!
//! let state = DashboardState::new("Building_Permits.csv", Some("out/cleaned.csv".into()));
//! server::serve(state, "127.0.0.1:8501".parse()?).await?;
//! ```

pub mod classify;
pub mod error;
pub mod figure;
pub mod pages;
pub mod sampling;
pub mod server;
pub mod shell;
pub mod state;
pub mod stats;

pub use error::{DashboardError, Result};
pub use figure::Figure;
pub use server::{router, serve};
pub use state::{DashboardState, DatasetChoice};
