/// Where callers land after a successful action when no usable return url was given.
pub const DEFAULT_REDIRECT: &str = "/";

/// Basket page used when the sign-in form was reached from checkout.
pub const BASKET_REDIRECT: &str = "/basket";

/// Keep only same-site paths. Absolute urls, protocol-relative urls and backslash tricks fall
/// back to [`DEFAULT_REDIRECT`].
pub fn resolve_return_url(return_url: Option<&str>) -> String {
    match return_url.map(str::trim) {
        Some(url) if is_local_url(url) => url.to_string(),
        _ => DEFAULT_REDIRECT.to_string(),
    }
}

/// Return url offered by the sign-in form. Checkout flows resume at the basket.
pub fn sign_in_form_return_url(return_url: Option<&str>) -> Option<String> {
    let url = return_url.map(str::trim).filter(|url| !url.is_empty())?;
    if url.to_ascii_lowercase().contains("checkout") {
        return Some(BASKET_REDIRECT.to_string());
    }
    Some(url.to_string())
}

fn is_local_url(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\")
}
