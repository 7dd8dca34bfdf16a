//! Test configuration pointing every endpoint at a mock server

use catalog_harvest::Config;
use std::path::Path;
use wiremock::MockServer;

/// Config whose API and image server are both `server`, with all output under `root`
pub fn test_config(server: &MockServer, root: &Path) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.download.image_base_url = server.uri();
    config.download.output_dir = root.join("images");
    config.download.max_concurrent_downloads = 4;
    config.export.output_file = root.join("combined_data.csv");
    config.export.flat_output_file = root.join("nodes_data_with_hex_sorted.csv");
    config
}
