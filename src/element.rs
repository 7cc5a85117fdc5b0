use std::fmt;

/// A chemical element, identified by atomic number (1–118).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

impl Element {
    pub const H: Element = Element(1);
    pub const B: Element = Element(5);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const F: Element = Element(9);
    pub const SI: Element = Element(14);
    pub const P: Element = Element(15);
    pub const S: Element = Element(16);
    pub const CL: Element = Element(17);
    pub const SE: Element = Element(34);
    pub const BR: Element = Element(35);
    pub const I: Element = Element(53);

    pub fn from_atomic_num(n: u8) -> Option<Element> {
        if (1..=118).contains(&n) {
            Some(Element(n))
        } else {
            None
        }
    }

    pub fn from_symbol(s: &str) -> Option<Element> {
        SYMBOLS
            .iter()
            .position(|&sym| sym == s)
            .map(|i| Element(i as u8 + 1))
    }

    pub fn atomic_num(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        SYMBOLS[self.0 as usize - 1]
    }

    /// Allowed neutral valences, lowest first. Empty for elements outside the
    /// organic subset, whose hydrogen counts are never inferred.
    pub fn default_valences(self) -> &'static [u8] {
        match self.0 {
            1 => &[1],
            5 => &[3],
            6 => &[4],
            7 => &[3, 5],
            8 => &[2],
            9 | 17 | 35 | 85 => &[1],
            14 | 32 => &[4],
            15 | 33 => &[3, 5],
            16 | 34 | 52 => &[2, 4, 6],
            53 => &[1, 3, 5, 7],
            _ => &[],
        }
    }

    /// Elements that may be written without brackets in SMILES.
    pub fn is_organic_subset(self) -> bool {
        matches!(self.0, 5 | 6 | 7 | 8 | 9 | 15 | 16 | 17 | 35 | 53)
    }

    /// Elements with a lowercase aromatic spelling.
    pub fn can_be_aromatic(self) -> bool {
        matches!(self.0, 5 | 6 | 7 | 8 | 15 | 16 | 33 | 34 | 52)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

static SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th",
    "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm",
    "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds",
    "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_round_trip() {
        for n in 1..=118u8 {
            let e = Element::from_atomic_num(n).unwrap();
            assert_eq!(Element::from_symbol(e.symbol()), Some(e));
        }
    }

    #[test]
    fn atomic_num_bounds() {
        assert!(Element::from_atomic_num(0).is_none());
        assert!(Element::from_atomic_num(119).is_none());
        assert_eq!(Element::from_atomic_num(6), Some(Element::C));
    }

    #[test]
    fn symbols_are_case_sensitive() {
        assert_eq!(Element::from_symbol("Cl"), Some(Element::CL));
        assert!(Element::from_symbol("CL").is_none());
        assert!(Element::from_symbol("cl").is_none());
    }

    #[test]
    fn default_valences() {
        assert_eq!(Element::C.default_valences(), &[4]);
        assert_eq!(Element::N.default_valences(), &[3, 5]);
        assert_eq!(Element::S.default_valences(), &[2, 4, 6]);
        assert!(Element::from_symbol("Na").unwrap().default_valences().is_empty());
    }

    #[test]
    fn organic_subset() {
        assert!(Element::C.is_organic_subset());
        assert!(Element::BR.is_organic_subset());
        assert!(!Element::SE.is_organic_subset());
        assert!(!Element::H.is_organic_subset());
    }

    #[test]
    fn debug_prints_symbol() {
        assert_eq!(format!("{:?}", Element::CL), "Cl");
    }
}
