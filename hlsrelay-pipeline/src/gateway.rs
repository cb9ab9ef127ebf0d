// Delivery gateway mirroring
//
// Locators embed the default gateway. Each alternate gateway gets its own
// copy of every playlist, named `{host}_{file}`, with the default host
// swapped for the alternate's.

use hlsrelay_core::config::GatewayConfig;
use hlsrelay_core::{Error, Result};
use url::Url;

/// `host[:port]` of a gateway URL
pub fn gateway_host(gateway: &str) -> Result<String> {
    let url = Url::parse(gateway)
        .map_err(|e| Error::Config(format!("Invalid gateway URL {gateway}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::Config(format!("Gateway URL {gateway} has no host")))?;

    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct GatewayMirror {
    default_host: String,
    alternates: Vec<String>,
}

impl GatewayMirror {
    pub fn new(default_gateway: &str, alternates: &[String]) -> Result<Self> {
        Ok(Self {
            default_host: gateway_host(default_gateway)?,
            alternates: alternates
                .iter()
                .map(|g| gateway_host(g))
                .collect::<Result<_>>()?,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Self::new(&config.default_gateway, &config.sub_gateways)
    }

    #[must_use]
    pub fn alternates(&self) -> &[String] {
        &self.alternates
    }

    /// Variant playlist as served through `alternate`
    #[must_use]
    pub fn mirror_playlist(&self, playlist: &str, alternate: &str) -> String {
        if self.default_host.is_empty() {
            return playlist.to_string();
        }
        playlist.replace(&self.default_host, alternate)
    }

    /// Master playlist pointing at the `alternate`'s variant playlists
    #[must_use]
    pub fn mirror_master(master: &str, alternate: &str, variant_file_name: &str) -> String {
        master.replace(variant_file_name, &mirrored_file_name(alternate, variant_file_name))
    }
}

#[must_use]
pub fn mirrored_file_name(alternate: &str, file_name: &str) -> String {
    format!("{alternate}_{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_host() {
        assert_eq!(gateway_host("http://localhost:8888").unwrap(), "localhost:8888");
        assert_eq!(gateway_host("https://cdn.example.com/").unwrap(), "cdn.example.com");
        assert_eq!(gateway_host("http://10.0.0.2:80").unwrap(), "10.0.0.2");
        assert!(matches!(gateway_host("not a url"), Err(Error::Config(_))));
    }

    #[test]
    fn test_mirror_playlist_swaps_host() {
        let mirror =
            GatewayMirror::new("http://localhost:8888", &["http://gw2.example.com:8080".into()])
                .unwrap();
        assert_eq!(mirror.alternates(), ["gw2.example.com:8080"]);

        let live = "#EXTINF:4.0,\nhttp://localhost:8888/content/abc?fileName=seg0.ts\n";
        assert_eq!(
            mirror.mirror_playlist(live, "gw2.example.com:8080"),
            "#EXTINF:4.0,\nhttp://gw2.example.com:8080/content/abc?fileName=seg0.ts\n"
        );
    }

    #[test]
    fn test_mirror_master_renames_variants() {
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\n0/stream.m3u8\n\
                      #EXT-X-STREAM-INF:BANDWIDTH=2800000\n1/stream.m3u8\n";

        let mirrored = GatewayMirror::mirror_master(master, "gw2:8080", "stream.m3u8");

        assert!(mirrored.contains("\n0/gw2:8080_stream.m3u8\n"));
        assert!(mirrored.contains("\n1/gw2:8080_stream.m3u8\n"));
        assert_eq!(mirrored_file_name("gw2:8080", "index.m3u8"), "gw2:8080_index.m3u8");
    }
}
