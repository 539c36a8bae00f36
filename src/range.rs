//! The range grammar (§4.3): 18 tags decoding to a 5-tuple descriptor.

/// One of the 18 recognized range shapes. Naming follows §4.3: a `Back`
/// suffix reverses direction; `AtLeast`/`AtMost`/`GreaterThan`/`LessThan`
/// are single-bounded; `Closed`/`ClosedOpen`/`Open`/`OpenClosed` are
/// double-bounded with inclusivity encoded by the name; `All` is
/// unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeTag {
    All,
    AllBack,
    AtLeast,
    AtLeastBack,
    AtMost,
    AtMostBack,
    Closed,
    ClosedBack,
    ClosedOpen,
    ClosedOpenBack,
    Open,
    OpenBack,
    OpenClosed,
    OpenClosedBack,
    GreaterThan,
    GreaterThanBack,
    LessThan,
    LessThanBack,
}

impl RangeTag {
    /// Parse the kebab-case tag name used in `spec.md`'s table (`"closed"`,
    /// `"at-least-back"`, ...). An unknown tag is a programmer error, so
    /// this panics rather than returning a `Result` (§4.3).
    pub fn parse(tag: &str) -> RangeTag {
        use RangeTag::*;
        match tag {
            "all" => All,
            "all-back" => AllBack,
            "at-least" => AtLeast,
            "at-least-back" => AtLeastBack,
            "at-most" => AtMost,
            "at-most-back" => AtMostBack,
            "closed" => Closed,
            "closed-back" => ClosedBack,
            "closed-open" => ClosedOpen,
            "closed-open-back" => ClosedOpenBack,
            "open" => Open,
            "open-back" => OpenBack,
            "open-closed" => OpenClosed,
            "open-closed-back" => OpenClosedBack,
            "greater-than" => GreaterThan,
            "greater-than-back" => GreaterThanBack,
            "less-than" => LessThan,
            "less-than-back" => LessThanBack,
            other => panic!("unknown range tag: {other:?}"),
        }
    }
}

/// The decoded 5-tuple a [`RangeTag`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeDescriptor {
    pub forward: bool,
    pub has_start: bool,
    pub include_start: bool,
    pub has_stop: bool,
    pub include_stop: bool,
}

impl From<RangeTag> for RangeDescriptor {
    fn from(tag: RangeTag) -> RangeDescriptor {
        use RangeTag::*;
        let (forward, has_start, include_start, has_stop, include_stop) = match tag {
            All => (true, false, false, false, false),
            AllBack => (false, false, false, false, false),
            AtLeast => (true, true, true, false, false),
            AtLeastBack => (false, true, true, false, false),
            AtMost => (true, false, false, true, true),
            AtMostBack => (false, false, false, true, true),
            Closed => (true, true, true, true, true),
            ClosedBack => (false, true, true, true, true),
            ClosedOpen => (true, true, true, true, false),
            ClosedOpenBack => (false, true, true, true, false),
            Open => (true, true, false, true, false),
            OpenBack => (false, true, false, true, false),
            OpenClosed => (true, true, false, true, true),
            OpenClosedBack => (false, true, false, true, true),
            GreaterThan => (true, true, false, false, false),
            GreaterThanBack => (false, true, false, false, false),
            LessThan => (true, false, false, true, false),
            LessThanBack => (false, false, false, true, false),
        };
        RangeDescriptor { forward, has_start, include_start, has_stop, include_stop }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_tag_from_the_spec_table() {
        let cases: &[(&str, RangeDescriptor)] = &[
            ("all", RangeDescriptor { forward: true, has_start: false, include_start: false, has_stop: false, include_stop: false }),
            ("all-back", RangeDescriptor { forward: false, has_start: false, include_start: false, has_stop: false, include_stop: false }),
            ("at-least", RangeDescriptor { forward: true, has_start: true, include_start: true, has_stop: false, include_stop: false }),
            ("at-least-back", RangeDescriptor { forward: false, has_start: true, include_start: true, has_stop: false, include_stop: false }),
            ("at-most", RangeDescriptor { forward: true, has_start: false, include_start: false, has_stop: true, include_stop: true }),
            ("at-most-back", RangeDescriptor { forward: false, has_start: false, include_start: false, has_stop: true, include_stop: true }),
            ("closed", RangeDescriptor { forward: true, has_start: true, include_start: true, has_stop: true, include_stop: true }),
            ("closed-back", RangeDescriptor { forward: false, has_start: true, include_start: true, has_stop: true, include_stop: true }),
            ("closed-open", RangeDescriptor { forward: true, has_start: true, include_start: true, has_stop: true, include_stop: false }),
            ("closed-open-back", RangeDescriptor { forward: false, has_start: true, include_start: true, has_stop: true, include_stop: false }),
            ("open", RangeDescriptor { forward: true, has_start: true, include_start: false, has_stop: true, include_stop: false }),
            ("open-back", RangeDescriptor { forward: false, has_start: true, include_start: false, has_stop: true, include_stop: false }),
            ("open-closed", RangeDescriptor { forward: true, has_start: true, include_start: false, has_stop: true, include_stop: true }),
            ("open-closed-back", RangeDescriptor { forward: false, has_start: true, include_start: false, has_stop: true, include_stop: true }),
            ("greater-than", RangeDescriptor { forward: true, has_start: true, include_start: false, has_stop: false, include_stop: false }),
            ("greater-than-back", RangeDescriptor { forward: false, has_start: true, include_start: false, has_stop: false, include_stop: false }),
            ("less-than", RangeDescriptor { forward: true, has_start: false, include_start: false, has_stop: true, include_stop: false }),
            ("less-than-back", RangeDescriptor { forward: false, has_start: false, include_start: false, has_stop: true, include_stop: false }),
        ];
        for (name, expected) in cases {
            assert_eq!(RangeDescriptor::from(RangeTag::parse(name)), *expected, "tag {name}");
        }
    }

    #[test]
    fn back_variant_only_flips_direction() {
        let fwd = RangeDescriptor::from(RangeTag::ClosedOpen);
        let back = RangeDescriptor::from(RangeTag::ClosedOpenBack);
        assert_eq!(fwd.forward, !back.forward);
        assert_eq!(fwd.has_start, back.has_start);
        assert_eq!(fwd.include_start, back.include_start);
        assert_eq!(fwd.has_stop, back.has_stop);
        assert_eq!(fwd.include_stop, back.include_stop);
    }

    #[test]
    #[should_panic(expected = "unknown range tag")]
    fn unknown_tag_panics() {
        RangeTag::parse("sideways");
    }
}
