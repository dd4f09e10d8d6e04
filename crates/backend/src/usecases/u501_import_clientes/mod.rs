pub mod clients_api_client;
pub mod csv_reader;
pub mod executor;
pub mod session;
pub mod session_store;

pub use clients_api_client::HttpClientsApi;
pub use executor::ImportExecutor;
