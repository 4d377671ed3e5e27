/// Final component of a library path, used as the library's display name.
///
/// Both `/` and `\` count as separators so Windows paths received over the
/// wire resolve the same way on every platform.
///
/// ```
/// use msseek::utils::lib_name_from_path;
///
/// assert_eq!(lib_name_from_path(r"C:\NIST\MSSEARCH\mainlib"), "mainlib");
/// assert_eq!(lib_name_from_path("/data/libs/nist.msp"), "nist.msp");
/// ```
pub fn lib_name_from_path(path: &str) -> String {
    let trimmed = path.trim_end_matches(['/', '\\']);
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lib_name_from_path() {
        assert_eq!(lib_name_from_path("mainlib"), "mainlib");
        assert_eq!(lib_name_from_path("./libs/mona/"), "mona");
        assert_eq!(lib_name_from_path(r"D:\libs\replib\"), "replib");
        assert_eq!(lib_name_from_path(""), "");
    }
}
