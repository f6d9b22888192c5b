use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Everything but RFC 3986 unreserved characters.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Path under which the web layer serves relayed resources:
/// `/relay/{source}/{target}`, both segments percent-encoded so the target
/// URL fits in a single segment.
pub fn proxy_path(source_key: &str, target: &str) -> String {
    format!("/relay/{}/{}", utf8_percent_encode(source_key, SEGMENT), utf8_percent_encode(target, SEGMENT))
}

/// Inverse of [`proxy_path`]: the source key and target URL of a relay
/// path, or `None` if it isn't one.
pub fn parse_proxy_path(path: &str) -> Option<(String, String)> {
    let (source, target) = path.strip_prefix("/relay/")?.split_once('/')?;
    if source.is_empty() || target.is_empty() || target.contains('/') {
        return None;
    }
    let source = percent_decode_str(source).decode_utf8().ok()?.into_owned();
    let target = percent_decode_str(target).decode_utf8().ok()?.into_owned();
    Some((source, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("alpha", "https://img.example/p1.jpg", "/relay/alpha/https%3A%2F%2Fimg.example%2Fp1.jpg")]
    #[case("alpha", "https://img.example/p 1.jpg?w=800&h=600", "/relay/alpha/https%3A%2F%2Fimg.example%2Fp%201.jpg%3Fw%3D800%26h%3D600")]
    #[case("mangá", "https://img.example/ページ.png", "/relay/mang%C3%A1/https%3A%2F%2Fimg.example%2F%E3%83%9A%E3%83%BC%E3%82%B8.png")]
    fn test_proxy_path(#[case] source: &str, #[case] target: &str, #[case] expected: &str) {
        let path = proxy_path(source, target);
        assert_eq!(path, expected);
        assert_eq!(parse_proxy_path(&path), Some((source.to_string(), target.to_string())));
    }

    #[rstest]
    #[case("/relay/alpha")]
    #[case("/relay//https%3A%2F%2Fimg.example")]
    #[case("/other/alpha/x")]
    #[case("/relay/alpha/https://img.example/p1.jpg")]
    fn test_not_a_relay_path(#[case] path: &str) {
        assert_eq!(parse_proxy_path(path), None);
    }
}
