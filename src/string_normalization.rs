/// Lower-cases and trims `input`, collapsing every run of whitespace to a single space.
pub fn clean_str(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Key under which two tracks are considered the same entity across providers.
pub fn identity_key(title: &str, artist: &str) -> String {
    format!("{}\u{1f}{}", clean_str(title), clean_str(artist))
}
