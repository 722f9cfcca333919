use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

static HUGGINGFACE_REPO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"huggingface\.co/([^/]+/[^/]+)").expect("static regex"));

/// Short human label for a source URL received in a `sources` event.
pub fn format_source_label(url: &str) -> String {
    if url.contains("skbl.se") {
        return "SKBL - Svenskt kvinnobiografiskt lexikon".to_string();
    }
    if url.contains("huggingface.co") {
        return match HUGGINGFACE_REPO.captures(url) {
            Some(caps) => format!("HuggingFace: {}", &caps[1]),
            None => "HuggingFace Model".to_string(),
        };
    }
    match Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(str::to_string)
            .unwrap_or_else(|| url.to_string()),
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skbl_links_get_the_lexicon_name() {
        assert_eq!(
            format_source_label("https://skbl.se/sv/artikel/SelmaLagerlof"),
            "SKBL - Svenskt kvinnobiografiskt lexikon"
        );
    }

    #[test]
    fn huggingface_links_name_the_repo() {
        assert_eq!(
            format_source_label("https://huggingface.co/meta-llama/Llama-3.1-8B"),
            "HuggingFace: meta-llama/Llama-3.1-8B"
        );
        assert_eq!(
            format_source_label("https://huggingface.co/models"),
            "HuggingFace Model"
        );
    }

    #[test]
    fn other_links_fall_back_to_host_then_raw() {
        assert_eq!(format_source_label("https://example.org/a/b"), "example.org");
        assert_eq!(format_source_label("not a url"), "not a url");
    }
}
