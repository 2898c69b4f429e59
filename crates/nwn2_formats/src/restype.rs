//! Resource type ids and their file extensions.

/// `(type id, extension)` pairs for the resource types the toolset and game use.
const RESOURCE_TYPES: &[(u16, &str)] = &[
    (1, "bmp"),
    (3, "tga"),
    (4, "wav"),
    (6, "plt"),
    (7, "ini"),
    (10, "txt"),
    (2002, "mdl"),
    (2009, "nss"),
    (2010, "ncs"),
    (2012, "are"),
    (2013, "set"),
    (2014, "ifo"),
    (2015, "bic"),
    (2016, "wok"),
    (2017, "2da"),
    (2018, "tlk"),
    (2022, "txi"),
    (2023, "git"),
    (2025, "uti"),
    (2027, "utc"),
    (2029, "dlg"),
    (2030, "itp"),
    (2032, "utt"),
    (2033, "dds"),
    (2035, "uts"),
    (2036, "ltr"),
    (2037, "gff"),
    (2038, "fac"),
    (2040, "ute"),
    (2042, "utd"),
    (2044, "utp"),
    (2045, "dft"),
    (2046, "gic"),
    (2047, "gui"),
    (2051, "utm"),
    (2052, "dwk"),
    (2053, "pwk"),
    (2056, "jrl"),
    (2058, "utw"),
    (2060, "ssf"),
    (2064, "ndb"),
    (2065, "ptm"),
    (2066, "ptt"),
    (3000, "trn"),
    (3001, "utr"),
    (3002, "uen"),
    (3003, "ult"),
    (3004, "sef"),
    (3005, "pfx"),
    (3006, "cam"),
    (3007, "lfx"),
    (3008, "bfx"),
    (3009, "upe"),
    (3010, "ros"),
    (3011, "rst"),
    (3012, "ifx"),
    (3013, "pfb"),
    (3014, "zip"),
    (3015, "wmp"),
    (3016, "bbx"),
    (3017, "tfx"),
    (3018, "wlk"),
    (3019, "xml"),
    (3020, "scc"),
    (3033, "ptx"),
    (3034, "ltx"),
    (3035, "trx"),
    (4000, "mdb"),
    (4001, "mda"),
    (4002, "spt"),
    (4003, "gr2"),
    (4004, "fxa"),
    (4005, "fxe"),
    (4007, "jpg"),
    (4008, "pwc"),
];

/// Extension for a resource type id.
pub fn extension_for_type(res_type: u16) -> Option<&'static str> {
    RESOURCE_TYPES
        .iter()
        .find(|(id, _)| *id == res_type)
        .map(|(_, ext)| *ext)
}

/// Resource type id for an extension (case-insensitive).
pub fn type_for_extension(ext: &str) -> Option<u16> {
    RESOURCE_TYPES
        .iter()
        .find(|(_, e)| e.eq_ignore_ascii_case(ext))
        .map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_types() {
        assert_eq!(type_for_extension("2DA"), Some(2017));
        assert_eq!(extension_for_type(2018), Some("tlk"));
        assert_eq!(type_for_extension("ifo"), Some(2014));
    }

    #[test]
    fn test_every_extension_maps_back() {
        for (_, ext) in RESOURCE_TYPES {
            let id = type_for_extension(ext).unwrap();
            assert_eq!(extension_for_type(id), Some(*ext));
        }
    }

    #[test]
    fn test_unknown() {
        assert_eq!(type_for_extension("exe"), None);
        assert_eq!(extension_for_type(9999), None);
    }
}
