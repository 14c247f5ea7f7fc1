use url::Url;

/// Key used to identify a page across the run: the absolute URL without its
/// fragment. Unparseable input is returned as-is.
pub fn normalize(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

/// Resolve an attribute value (`href`, `src`) against the page it was found on
pub fn resolve(base: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    match Url::parse(base) {
        Ok(base) => base.join(reference).ok().map(|u| u.to_string()),
        Err(_) => Url::parse(reference).ok().map(|u| u.to_string()),
    }
}

/// Host of an absolute URL, lowercased by the parser
pub fn hostname(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}
