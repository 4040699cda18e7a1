/// Builds a relative URL out of path segments, used for the `Location` of
/// newly created rows. Slashes inside a segment split it further and empty
/// parts are skipped, so roots like `/api/persons` can be passed as is. Each
/// part is percent-encoded, with spaces written as `%20`.
///
/// Example:
/// ```rust
/// use cmms_common::yuri;
///
/// let person = yuri!("api", "persons", "P001");
/// let location = yuri!("/api/locations", &5.to_string());
/// let building = yuri!("/api/building-supervision/by-building", "Block A");
///
/// assert_eq!("/api/persons/P001", person);
/// assert_eq!("/api/locations/5", location);
/// assert_eq!("/api/building-supervision/by-building/Block%20A", building);
/// ```
#[macro_export]
macro_rules! yuri {
    ($($segment:expr),+) => {{
        let mut uri = String::new();

        $(
            for part in $segment.split('/').filter(|part| !part.is_empty()) {
                uri.push('/');

                // form encoding emits a lone "+" for a space, a literal '+' comes out as %2B
                for encoded in form_urlencoded::byte_serialize(part.as_bytes()) {
                    uri.push_str(if encoded == "+" { "%20" } else { encoded });
                }
            }
        )+

        uri
    }};
}
