//! Property tests for version ordering and version patterns

use pdp_core::policy::{PolicyVersion, PolicyVersions, VersionConstraints, VersionPattern};
use proptest::prelude::*;

fn components() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..12, 1..5)
}

fn dotted(components: &[u32]) -> String {
    components.iter().map(u32::to_string).collect::<Vec<_>>().join(".")
}

fn version(components: &[u32]) -> PolicyVersion {
    PolicyVersion::parse(&dotted(components)).unwrap()
}

proptest! {
    #[test]
    fn test_display_parses_back(c in components()) {
        let v = version(&c);
        prop_assert_eq!(v.components(), c.as_slice());
        prop_assert_eq!(PolicyVersion::parse(&v.to_string()).unwrap(), v);
    }

    #[test]
    fn test_literal_pattern_agrees_with_ordering(a in components(), b in components()) {
        let pattern = VersionPattern::parse(&dotted(&a)).unwrap();
        let (va, vb) = (version(&a), version(&b));
        prop_assert_eq!(pattern.matches(&vb), va == vb);
        prop_assert_eq!(pattern.is_later_or_matches(&vb), va >= vb);
        prop_assert_eq!(pattern.is_earlier_or_matches(&vb), va <= vb);
    }

    #[test]
    fn test_plus_matches_any_extension(prefix in components(), suffix in prop::collection::vec(0u32..12, 0..3)) {
        let pattern = VersionPattern::parse(&format!("{}.+", dotted(&prefix))).unwrap();
        let mut extended = prefix.clone();
        extended.extend(&suffix);
        prop_assert!(pattern.matches(&version(&extended)));
    }

    #[test]
    fn test_star_matches_any_component(c in components(), index in 0usize..4, replacement in 0u32..12) {
        let index = index % c.len();
        let mut parts: Vec<String> = c.iter().map(u32::to_string).collect();
        parts[index] = "*".to_string();
        let pattern = VersionPattern::parse(&parts.join(".")).unwrap();

        let mut other = c.clone();
        other[index] = replacement;
        prop_assert!(pattern.matches(&version(&c)));
        prop_assert!(pattern.matches(&version(&other)));

        let mut longer = c.clone();
        longer.push(0);
        prop_assert!(!pattern.matches(&version(&longer)));
    }

    #[test]
    fn test_star_as_earliest_bound_behaves_as_zero(c in components(), index in 0usize..4, other in components()) {
        let index = index % c.len();
        let mut parts: Vec<String> = c.iter().map(u32::to_string).collect();
        parts[index] = "*".to_string();
        let star = VersionPattern::parse(&parts.join(".")).unwrap();
        parts[index] = "0".to_string();
        let zero = VersionPattern::parse(&parts.join(".")).unwrap();

        let other = version(&other);
        prop_assert_eq!(star.is_earlier_or_matches(&other), zero.is_earlier_or_matches(&other));
    }

    #[test]
    fn test_latest_bound_selects_greatest_accepted(
        stored in prop::collection::btree_set(components(), 1..8),
        bound in components(),
    ) {
        let mut versions = PolicyVersions::new();
        for c in &stored {
            versions.insert(version(c), dotted(c));
        }
        let constraints = VersionConstraints::parse(None, None, Some(&dotted(&bound))).unwrap();

        let bound = version(&bound);
        let expected = stored.iter().map(|c| version(c)).filter(|v| *v <= bound).max();
        let selected = versions.get_latest(&constraints).map(|(v, _)| v.clone());
        prop_assert_eq!(selected, expected);

        let unconstrained = versions.get_latest(&VersionConstraints::any()).map(|(v, _)| v.clone());
        prop_assert_eq!(unconstrained, stored.iter().map(|c| version(c)).max());
    }
}
