//! # URL Sanitizer
//!
//! Path normalization shared by route registration and request dispatch.
//! Both sides go through [`sanitize`], so a controller mounted at `/api/`
//! and a request for `/api//users/` meet at the same `/api/users`.

/// Join path segments into a canonical absolute path
///
/// Segments are joined with `/`, runs of `/` collapse into one, a leading
/// `/` is added and any trailing `/` is dropped. The root is `/`.
///
/// ```
/// use trellis_core::sanitizer::sanitize;
///
/// assert_eq!(sanitize(["", "a", "", "b"]), "/a/b");
/// assert_eq!(sanitize(["/api/", "/users/"]), "/api/users");
/// assert_eq!(sanitize(["/"]), "/");
/// ```
pub fn sanitize<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::from("/");

    for segment in segments {
        for part in segment.as_ref().split('/').filter(|p| !p.is_empty()) {
            if !out.ends_with('/') {
                out.push('/');
            }
            out.push_str(part);
        }
    }

    out
}

/// Sanitize a single path string
#[must_use]
pub fn sanitize_path(path: &str) -> String {
    sanitize([path])
}
