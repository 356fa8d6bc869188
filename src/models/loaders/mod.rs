pub mod url_loader;

pub use url_loader::{load_urls_from_file, parse_url_list};
