//! Video/image variants shown during the reveal
//!
//! The list is fixed at compile time; an assignment stores only the index.

use serde::Serialize;

/// One (video, image) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariantDescriptor {
    pub name: &'static str,
    pub video_asset_path: &'static str,
    pub image_asset_path: &'static str,
}

/// Closed-card image shown in `Idle` and `Opening`
pub const CARD_IMAGE_PATH: &str = "/Carta.png";

/// All variants, in index order
pub const VARIANTES: [VariantDescriptor; 4] = [
    VariantDescriptor {
        name: "Fotografia",
        video_asset_path: "/Fotografia.mov",
        image_asset_path: "/Fotografia.png",
    },
    VariantDescriptor {
        name: "Pandulce",
        video_asset_path: "/Pandulce.mov",
        image_asset_path: "/Pandulce.png",
    },
    VariantDescriptor {
        name: "Saludo",
        video_asset_path: "/Saludo.mov",
        image_asset_path: "/Saludo.png",
    },
    VariantDescriptor {
        name: "Vino",
        video_asset_path: "/Vino.mov",
        image_asset_path: "/Vino.png",
    },
];

/// Number of variants (M)
pub const VARIANT_COUNT: usize = VARIANTES.len();

/// Variant at `index`, if in range
pub fn variant(index: usize) -> Option<&'static VariantDescriptor> {
    VARIANTES.get(index)
}

/// Variant derived from a phrase id (`phrase_id mod M`)
pub fn variant_index_for_phrase(phrase_id: i64) -> usize {
    phrase_id.rem_euclid(VARIANT_COUNT as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_variants_in_order() {
        let names: Vec<_> = VARIANTES.iter().map(|v| v.name).collect();
        assert_eq!(names, ["Fotografia", "Pandulce", "Saludo", "Vino"]);
        assert_eq!(variant(2).unwrap().video_asset_path, "/Saludo.mov");
        assert!(variant(4).is_none());
    }

    #[test]
    fn test_derived_index_is_pure_and_in_range() {
        for phrase_id in 1..=50 {
            let index = variant_index_for_phrase(phrase_id);
            assert!(index < VARIANT_COUNT);
            assert_eq!(index, variant_index_for_phrase(phrase_id));
        }
        assert_eq!(variant_index_for_phrase(7), 3);
        assert_eq!(variant_index_for_phrase(8), 0);
    }
}
