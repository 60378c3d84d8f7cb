use crate::entity::{Arrangement, PlaceSpec, Sharing};
use crate::error::{Error, Result};

/// Parses a `place=<comma-list>` spec into its arrangement, sharing mode,
/// and optional grouping resource.
pub fn parse_place(spec: &str) -> Result<PlaceSpec> {
    let mut place = PlaceSpec::default();
    if spec.trim().is_empty() {
        return Ok(place);
    }

    for term in spec.split(':') {
        let term = term.trim();
        match term {
            "" | "free" => {}
            "pack" => place.arrangement = Arrangement::Pack,
            "scatter" => place.arrangement = Arrangement::Scatter,
            "vscatter" => place.arrangement = Arrangement::VScatter,
            "excl" => place.sharing = Sharing::Excl,
            "exclhost" => place.sharing = Sharing::ExclHost,
            "shared" | "share" => place.sharing = Sharing::Share,
            other => {
                if let Some((key, value)) = other.split_once('=') {
                    if key == "group" {
                        place.group = Some(value.to_string());
                        continue;
                    }
                }
                return Err(Error::BadPlaceSpec(format!("unrecognized place term: '{term}'")));
            }
        }
    }
    Ok(place)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arrangement_sharing_and_group() {
        let place = parse_place("scatter:excl:group=switch").unwrap();
        assert_eq!(place.arrangement, Arrangement::Scatter);
        assert_eq!(place.sharing, Sharing::Excl);
        assert_eq!(place.group.as_deref(), Some("switch"));
    }

    #[test]
    fn empty_spec_yields_defaults() {
        let place = parse_place("").unwrap();
        assert_eq!(place.arrangement, Arrangement::Free);
        assert_eq!(place.sharing, Sharing::Share);
    }

    #[test]
    fn rejects_an_unknown_term() {
        assert!(parse_place("bogus").is_err());
    }
}
