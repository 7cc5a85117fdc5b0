use std::collections::BTreeMap;

use petgraph::graph::{NodeIndex, UnGraph};

use crate::element::Element;

use super::error::PatternSyntaxError;
use super::query::{AtomExpr, BondExpr, Property, Recursive};
use super::Pattern;

type Graph = UnGraph<AtomExpr, BondExpr>;

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    next_recursive: &'a mut usize,
}

pub(super) fn parse_pattern(text: &str) -> Result<Pattern, PatternSyntaxError> {
    let mut counter = 0usize;
    parse_with_counter(text, &mut counter)
}

fn parse_with_counter(text: &str, counter: &mut usize) -> Result<Pattern, PatternSyntaxError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PatternSyntaxError::EmptyInput);
    }
    let mut parser = Parser {
        chars: trimmed.chars().collect(),
        pos: 0,
        next_recursive: counter,
    };
    let graph = parser.graph()?;
    Ok(Pattern {
        graph,
        source: trimmed.to_string(),
    })
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn unexpected(&self) -> PatternSyntaxError {
        match self.peek() {
            Some(ch) => PatternSyntaxError::UnexpectedChar { pos: self.pos, ch },
            None => PatternSyntaxError::UnexpectedEnd { pos: self.pos },
        }
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .ok()
    }

    fn graph(&mut self) -> Result<Graph, PatternSyntaxError> {
        let mut graph = Graph::default();
        let mut prev: Option<NodeIndex> = None;
        let mut bond: Option<BondExpr> = None;
        let mut branches: Vec<(NodeIndex, usize)> = Vec::new();
        let mut rings: BTreeMap<u16, (NodeIndex, Option<BondExpr>)> = BTreeMap::new();

        while let Some(c) = self.peek() {
            match c {
                '(' => {
                    let (Some(p), None) = (prev, &bond) else {
                        return Err(self.unexpected());
                    };
                    branches.push((p, self.pos));
                    self.pos += 1;
                }
                ')' => {
                    let Some((anchor, _)) = branches.pop() else {
                        return Err(PatternSyntaxError::UnmatchedParen { pos: self.pos });
                    };
                    if bond.is_some() {
                        return Err(self.unexpected());
                    }
                    prev = Some(anchor);
                    self.pos += 1;
                }
                '.' => {
                    if bond.is_some() || prev.is_none() {
                        return Err(self.unexpected());
                    }
                    prev = None;
                    self.pos += 1;
                }
                '-' | '=' | '#' | ':' | '~' | '@' | '!' | '/' | '\\' => {
                    if bond.is_some() || prev.is_none() {
                        return Err(self.unexpected());
                    }
                    bond = Some(self.bond_low_and()?);
                }
                '0'..='9' | '%' => {
                    let Some(current) = prev else {
                        return Err(self.unexpected());
                    };
                    let digit = self.ring_digit()?;
                    match rings.remove(&digit) {
                        Some((open, open_bond)) => {
                            if open == current || graph.find_edge(open, current).is_some() {
                                return Err(PatternSyntaxError::InvalidRingClosure { digit });
                            }
                            let expr = bond
                                .take()
                                .or(open_bond)
                                .unwrap_or(BondExpr::SingleOrAromatic);
                            graph.add_edge(open, current, expr);
                        }
                        None => {
                            rings.insert(digit, (current, bond.take()));
                        }
                    }
                }
                '[' => {
                    let expr = self.bracket_atom()?;
                    prev = Some(add_atom(&mut graph, prev, bond.take(), expr));
                }
                _ => {
                    let expr = self.bare_atom()?;
                    prev = Some(add_atom(&mut graph, prev, bond.take(), expr));
                }
            }
        }

        if bond.is_some() {
            return Err(PatternSyntaxError::UnexpectedEnd { pos: self.pos });
        }
        if let Some(&(_, pos)) = branches.last() {
            return Err(PatternSyntaxError::UnmatchedParen { pos });
        }
        if let Some((&digit, _)) = rings.iter().next() {
            return Err(PatternSyntaxError::UnclosedRing { digit });
        }
        Ok(graph)
    }

    fn ring_digit(&mut self) -> Result<u16, PatternSyntaxError> {
        if self.peek() == Some('%') {
            self.pos += 1;
            let (Some(a), Some(b)) = (
                self.peek().and_then(|c| c.to_digit(10)),
                self.peek_at(1).and_then(|c| c.to_digit(10)),
            ) else {
                return Err(self.unexpected());
            };
            self.pos += 2;
            return Ok((a * 10 + b) as u16);
        }
        let d = self
            .peek()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| self.unexpected())?;
        self.pos += 1;
        Ok(d as u16)
    }

    // Bond expressions: `;` binds loosest, then `,`, then `&`/juxtaposition, then `!`.

    fn bond_low_and(&mut self) -> Result<BondExpr, PatternSyntaxError> {
        let mut parts = vec![self.bond_or()?];
        while self.peek() == Some(';') {
            self.pos += 1;
            parts.push(self.bond_or()?);
        }
        Ok(collapse(parts, BondExpr::And))
    }

    fn bond_or(&mut self) -> Result<BondExpr, PatternSyntaxError> {
        let mut parts = vec![self.bond_high_and()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            parts.push(self.bond_high_and()?);
        }
        Ok(collapse(parts, BondExpr::Or))
    }

    fn bond_high_and(&mut self) -> Result<BondExpr, PatternSyntaxError> {
        let mut parts = vec![self.bond_not()?];
        loop {
            match self.peek() {
                Some('&') => {
                    self.pos += 1;
                    parts.push(self.bond_not()?);
                }
                Some('-' | '=' | '#' | ':' | '~' | '@' | '!' | '/' | '\\') => {
                    parts.push(self.bond_not()?)
                }
                _ => break,
            }
        }
        Ok(collapse(parts, BondExpr::And))
    }

    fn bond_not(&mut self) -> Result<BondExpr, PatternSyntaxError> {
        if self.peek() == Some('!') {
            self.pos += 1;
            return Ok(BondExpr::Not(Box::new(self.bond_not()?)));
        }
        let expr = match self.peek() {
            Some('-' | '/' | '\\') => BondExpr::Single,
            Some('=') => BondExpr::Double,
            Some('#') => BondExpr::Triple,
            Some(':') => BondExpr::Aromatic,
            Some('~') => BondExpr::Any,
            Some('@') => BondExpr::Ring,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        Ok(expr)
    }

    fn bare_atom(&mut self) -> Result<AtomExpr, PatternSyntaxError> {
        let start = self.pos;
        let c = self.peek().ok_or_else(|| self.unexpected())?;
        let expr = match (c, self.peek_at(1)) {
            ('*', _) => AtomExpr::Any,
            ('C', Some('l')) => element(Element::CL, Some(false)),
            ('B', Some('r')) => element(Element::BR, Some(false)),
            ('A', _) => AtomExpr::Aliphatic,
            ('a', _) => AtomExpr::Aromatic,
            ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I', _) => {
                let e = Element::from_symbol(&c.to_string())
                    .ok_or(PatternSyntaxError::UnknownElement { pos: start })?;
                element(e, Some(false))
            }
            ('b' | 'c' | 'n' | 'o' | 'p' | 's', _) => {
                let e = Element::from_symbol(&c.to_ascii_uppercase().to_string())
                    .ok_or(PatternSyntaxError::UnknownElement { pos: start })?;
                element(e, Some(true))
            }
            _ => return Err(self.unexpected()),
        };
        self.pos += match expr {
            AtomExpr::Element { element, .. } if element == Element::CL || element == Element::BR => 2,
            _ => 1,
        };
        Ok(expr)
    }

    fn bracket_atom(&mut self) -> Result<AtomExpr, PatternSyntaxError> {
        let open = self.pos;
        self.pos += 1;
        let expr = self.atom_low_and()?;
        let class = if self.peek() == Some(':') {
            self.pos += 1;
            let n = self.number().ok_or_else(|| self.unexpected())?;
            Some(u16::try_from(n).map_err(|_| PatternSyntaxError::InvalidRange { pos: self.pos })?)
        } else {
            None
        };
        match self.peek() {
            Some(']') => self.pos += 1,
            None => return Err(PatternSyntaxError::UnclosedBracket { pos: open }),
            Some(_) => return Err(self.unexpected()),
        }
        Ok(match class {
            Some(n) => match expr {
                AtomExpr::And(mut parts) => {
                    parts.push(AtomExpr::MapClass(n));
                    AtomExpr::And(parts)
                }
                other => AtomExpr::And(vec![other, AtomExpr::MapClass(n)]),
            },
            None => expr,
        })
    }

    fn atom_low_and(&mut self) -> Result<AtomExpr, PatternSyntaxError> {
        let mut parts = vec![self.atom_or()?];
        while self.peek() == Some(';') {
            self.pos += 1;
            parts.push(self.atom_or()?);
        }
        Ok(collapse(parts, AtomExpr::And))
    }

    fn atom_or(&mut self) -> Result<AtomExpr, PatternSyntaxError> {
        let mut parts = vec![self.atom_high_and()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            parts.push(self.atom_high_and()?);
        }
        Ok(collapse(parts, AtomExpr::Or))
    }

    fn atom_high_and(&mut self) -> Result<AtomExpr, PatternSyntaxError> {
        let mut parts = Vec::new();
        loop {
            match self.peek() {
                None | Some(']' | ',' | ';' | ':') => break,
                Some('&') => self.pos += 1,
                Some(_) => {
                    let leading = parts.iter().all(|p| matches!(p, AtomExpr::Isotope(_)));
                    parts.push(self.atom_not(leading)?);
                }
            }
        }
        if parts.is_empty() {
            return Err(self.unexpected());
        }
        Ok(collapse(parts, AtomExpr::And))
    }

    fn atom_not(&mut self, leading: bool) -> Result<AtomExpr, PatternSyntaxError> {
        if self.peek() == Some('!') {
            self.pos += 1;
            return Ok(AtomExpr::Not(Box::new(self.atom_not(false)?)));
        }
        self.primitive(leading)
    }

    /// One bracket primitive. `leading` is true when only an isotope precedes
    /// it in the conjunction, where a bare `H` names hydrogen rather than a
    /// hydrogen count.
    fn primitive(&mut self, leading: bool) -> Result<AtomExpr, PatternSyntaxError> {
        let start = self.pos;
        let c = self.peek().ok_or_else(|| self.unexpected())?;
        match c {
            '*' => {
                self.pos += 1;
                Ok(AtomExpr::Any)
            }
            '#' => {
                self.pos += 1;
                let n = self.number().ok_or(PatternSyntaxError::UnknownElement { pos: start })?;
                let e = u8::try_from(n)
                    .ok()
                    .and_then(Element::from_atomic_num)
                    .ok_or(PatternSyntaxError::UnknownElement { pos: start })?;
                Ok(element(e, None))
            }
            '0'..='9' => {
                let n = self.number().ok_or_else(|| self.unexpected())?;
                let iso = u16::try_from(n).map_err(|_| PatternSyntaxError::InvalidRange { pos: start })?;
                Ok(AtomExpr::Isotope(iso))
            }
            '+' | '-' => self.charge(c),
            '$' => self.recursive(),
            '@' => {
                while self.peek() == Some('@') {
                    self.pos += 1;
                }
                Ok(AtomExpr::Any)
            }
            'H' if leading && self.peek_at(1).is_some_and(|n| n.is_ascii_lowercase()) => {
                self.element_symbol()
            }
            'H' if leading && matches!(self.peek_at(1), Some(']' | ':' | ';' | ',' | '&' | '+' | '-') | None) => {
                self.pos += 1;
                Ok(element(Element::H, None))
            }
            'D' => self.counted(Property::Degree, 1),
            'X' => self.counted(Property::Connectivity, 1),
            'H' => self.counted(Property::TotalHydrogens, 1),
            'h' => self.counted(Property::ImplicitHydrogens, 1),
            'v' => self.counted(Property::Valence, 1),
            'x' => self.counted(Property::RingBonds, 1),
            'R' | 'r' if !self.peek_at(1).is_some_and(|n| n.is_ascii_digit() || n == '{') => {
                self.pos += 1;
                Ok(AtomExpr::InRing)
            }
            'R' => self.counted(Property::RingCount, 1),
            'r' => self.counted(Property::RingSize, 1),
            'A' if !self.peek_at(1).is_some_and(|n| n.is_ascii_lowercase()) => {
                self.pos += 1;
                Ok(AtomExpr::Aliphatic)
            }
            'a' if self.peek_at(1) != Some('s') => {
                self.pos += 1;
                Ok(AtomExpr::Aromatic)
            }
            _ if c.is_ascii_alphabetic() => self.element_symbol(),
            _ => Err(self.unexpected()),
        }
    }

    fn element_symbol(&mut self) -> Result<AtomExpr, PatternSyntaxError> {
        let start = self.pos;
        let Some(first) = self.peek() else {
            return Err(self.unexpected());
        };
        let aromatic = first.is_ascii_lowercase();
        let upper = first.to_ascii_uppercase();
        if let Some(second) = self.peek_at(1).filter(|c| c.is_ascii_lowercase()) {
            let two: String = [upper, second].iter().collect();
            if let Some(e) = Element::from_symbol(&two) {
                if !aromatic || e.can_be_aromatic() {
                    self.pos += 2;
                    return Ok(element(e, Some(aromatic)));
                }
            }
        }
        match Element::from_symbol(&upper.to_string()) {
            Some(e) if !aromatic || e.can_be_aromatic() => {
                self.pos += 1;
                Ok(element(e, Some(aromatic)))
            }
            _ => Err(PatternSyntaxError::UnknownElement { pos: start }),
        }
    }

    fn counted(&mut self, property: Property, default: u8) -> Result<AtomExpr, PatternSyntaxError> {
        self.pos += 1;
        let (low, high) = self.count_or_range(default)?;
        Ok(AtomExpr::Property {
            property,
            low,
            high,
        })
    }

    /// Parses `n`, `{lo-hi}`, `{lo-}` or `{-hi}` after a primitive letter.
    fn count_or_range(&mut self, default: u8) -> Result<(u8, u8), PatternSyntaxError> {
        let start = self.pos;
        let to_u8 = |n: u32| u8::try_from(n).map_err(|_| PatternSyntaxError::InvalidRange { pos: start });
        if self.peek() != Some('{') {
            let v = match self.number() {
                Some(n) => to_u8(n)?,
                None => default,
            };
            return Ok((v, v));
        }
        self.pos += 1;
        let low = self.number().map(to_u8).transpose()?.unwrap_or(0);
        if self.peek() != Some('-') {
            return Err(PatternSyntaxError::InvalidRange { pos: start });
        }
        self.pos += 1;
        let high = self.number().map(to_u8).transpose()?.unwrap_or(u8::MAX);
        if self.peek() != Some('}') || low > high {
            return Err(PatternSyntaxError::InvalidRange { pos: start });
        }
        self.pos += 1;
        Ok((low, high))
    }

    fn charge(&mut self, sign: char) -> Result<AtomExpr, PatternSyntaxError> {
        self.pos += 1;
        if self.peek() == Some('{') {
            let (low, high) = self.count_or_range(1)?;
            let property = if sign == '+' {
                Property::PositiveCharge
            } else {
                Property::NegativeCharge
            };
            return Ok(AtomExpr::Property {
                property,
                low,
                high,
            });
        }
        let magnitude = match self.number() {
            Some(n) => i8::try_from(n).map_err(|_| PatternSyntaxError::InvalidRange { pos: self.pos })?,
            None => {
                let mut m: i8 = 1;
                while self.peek() == Some(sign) {
                    m = m.saturating_add(1);
                    self.pos += 1;
                }
                m
            }
        };
        Ok(AtomExpr::Charge(if sign == '+' { magnitude } else { -magnitude }))
    }

    fn recursive(&mut self) -> Result<AtomExpr, PatternSyntaxError> {
        let start = self.pos;
        self.pos += 1;
        if self.peek() != Some('(') {
            return Err(PatternSyntaxError::UnclosedRecursive { pos: start });
        }
        self.pos += 1;
        let inner_start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.peek() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        if depth != 0 {
            return Err(PatternSyntaxError::UnclosedRecursive { pos: start });
        }
        let inner: String = self.chars[inner_start..self.pos].iter().collect();
        self.pos += 1;

        let id = *self.next_recursive;
        *self.next_recursive += 1;
        let pattern = parse_with_counter(&inner, self.next_recursive).map_err(|e| shift(e, inner_start))?;
        Ok(AtomExpr::Recursive(Recursive {
            id,
            pattern: Box::new(pattern),
        }))
    }
}

fn add_atom(graph: &mut Graph, prev: Option<NodeIndex>, bond: Option<BondExpr>, expr: AtomExpr) -> NodeIndex {
    let idx = graph.add_node(expr);
    if let Some(p) = prev {
        graph.add_edge(p, idx, bond.unwrap_or(BondExpr::SingleOrAromatic));
    }
    idx
}

fn element(element: Element, aromatic: Option<bool>) -> AtomExpr {
    AtomExpr::Element { element, aromatic }
}

fn collapse<T>(mut parts: Vec<T>, wrap: fn(Vec<T>) -> T) -> T {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        wrap(parts)
    }
}

/// Re-bases positions reported by a nested parse onto the outer text.
fn shift(err: PatternSyntaxError, offset: usize) -> PatternSyntaxError {
    use PatternSyntaxError::*;
    match err {
        UnexpectedChar { pos, ch } => UnexpectedChar { pos: pos + offset, ch },
        UnexpectedEnd { pos } => UnexpectedEnd { pos: pos + offset },
        UnclosedBracket { pos } => UnclosedBracket { pos: pos + offset },
        UnmatchedParen { pos } => UnmatchedParen { pos: pos + offset },
        UnknownElement { pos } => UnknownElement { pos: pos + offset },
        InvalidRange { pos } => InvalidRange { pos: pos + offset },
        UnclosedRecursive { pos } => UnclosedRecursive { pos: pos + offset },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Pattern {
        parse_pattern(s).unwrap_or_else(|e| panic!("bad pattern {s:?}: {e}"))
    }

    fn atom(p: &Pattern, i: usize) -> &AtomExpr {
        &p.graph()[NodeIndex::new(i)]
    }

    #[test]
    fn bare_atoms_and_implicit_bonds() {
        let p = parse("CCl");
        assert_eq!(p.atom_count(), 2);
        assert_eq!(*atom(&p, 1), element(Element::CL, Some(false)));
        let e = p.graph().find_edge(NodeIndex::new(0), NodeIndex::new(1)).unwrap();
        assert_eq!(p.graph()[e], BondExpr::SingleOrAromatic);
    }

    #[test]
    fn aromatic_and_wildcards() {
        let p = parse("c*aA");
        assert_eq!(*atom(&p, 0), element(Element::C, Some(true)));
        assert_eq!(*atom(&p, 1), AtomExpr::Any);
        assert_eq!(*atom(&p, 2), AtomExpr::Aromatic);
        assert_eq!(*atom(&p, 3), AtomExpr::Aliphatic);
    }

    #[test]
    fn bracket_primitives() {
        let p = parse("[CH3]");
        assert_eq!(
            *atom(&p, 0),
            AtomExpr::And(vec![
                element(Element::C, Some(false)),
                AtomExpr::Property {
                    property: Property::TotalHydrogens,
                    low: 3,
                    high: 3
                },
            ])
        );
        let p = parse("[#7;D{2-3}]");
        assert_eq!(
            *atom(&p, 0),
            AtomExpr::And(vec![
                element(Element::N, None),
                AtomExpr::Property {
                    property: Property::Degree,
                    low: 2,
                    high: 3
                },
            ])
        );
    }

    #[test]
    fn hydrogen_atom_versus_count() {
        assert_eq!(*atom(&parse("[H]"), 0), element(Element::H, None));
        assert_eq!(
            *atom(&parse("[2H]"), 0),
            AtomExpr::And(vec![AtomExpr::Isotope(2), element(Element::H, None)])
        );
        assert_eq!(
            *atom(&parse("[NH]"), 0),
            AtomExpr::And(vec![
                element(Element::N, Some(false)),
                AtomExpr::Property {
                    property: Property::TotalHydrogens,
                    low: 1,
                    high: 1
                },
            ])
        );
    }

    #[test]
    fn logic_precedence() {
        let p = parse("[C,N;!R]");
        let AtomExpr::And(parts) = atom(&p, 0) else {
            panic!("expected conjunction");
        };
        assert!(matches!(parts[0], AtomExpr::Or(_)));
        assert_eq!(parts[1], AtomExpr::Not(Box::new(AtomExpr::InRing)));
    }

    #[test]
    fn charges() {
        assert_eq!(*atom(&parse("[N+]"), 0), AtomExpr::And(vec![element(Element::N, Some(false)), AtomExpr::Charge(1)]));
        assert_eq!(*atom(&parse("[O-2]"), 0), AtomExpr::And(vec![element(Element::O, Some(false)), AtomExpr::Charge(-2)]));
        assert_eq!(*atom(&parse("[+{1-2}]"), 0), AtomExpr::Property {
            property: Property::PositiveCharge,
            low: 1,
            high: 2
        });
    }

    #[test]
    fn map_classes() {
        let p = parse("[*:1]C(F)(F)F");
        assert_eq!(atom(&p, 0).map_class(), Some(1));
        assert_eq!(atom(&p, 1).map_class(), None);
        assert_eq!(p.atom_count(), 5);
    }

    #[test]
    fn bond_expressions() {
        let p = parse("C-,=C!@C");
        let g = p.graph();
        let e0 = g.find_edge(NodeIndex::new(0), NodeIndex::new(1)).unwrap();
        assert_eq!(g[e0], BondExpr::Or(vec![BondExpr::Single, BondExpr::Double]));
        let e1 = g.find_edge(NodeIndex::new(1), NodeIndex::new(2)).unwrap();
        assert_eq!(g[e1], BondExpr::Not(Box::new(BondExpr::Ring)));
    }

    #[test]
    fn rings_and_branches() {
        let p = parse("c1ccccc1C(=O)O");
        assert_eq!(p.atom_count(), 9);
        assert_eq!(p.graph().edge_count(), 9);
        let e = p.graph().find_edge(NodeIndex::new(6), NodeIndex::new(7)).unwrap();
        assert_eq!(p.graph()[e], BondExpr::Double);
    }

    #[test]
    fn recursive_patterns_get_ids() {
        let p = parse("[$(CO),$(CN)]C");
        let AtomExpr::Or(parts) = atom(&p, 0) else {
            panic!("expected disjunction");
        };
        let ids: Vec<usize> = parts
            .iter()
            .filter_map(|p| match p {
                AtomExpr::Recursive(r) => Some(r.id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(parse_pattern("").unwrap_err(), PatternSyntaxError::EmptyInput);
        assert!(matches!(parse_pattern("[CH3"), Err(PatternSyntaxError::UnclosedBracket { .. })));
        assert!(matches!(parse_pattern("C1CC"), Err(PatternSyntaxError::UnclosedRing { digit: 1 })));
        assert!(matches!(parse_pattern("C(C"), Err(PatternSyntaxError::UnmatchedParen { .. })));
        assert!(matches!(parse_pattern("[Q]"), Err(PatternSyntaxError::UnknownElement { .. })));
        assert!(matches!(parse_pattern("[#200]"), Err(PatternSyntaxError::UnknownElement { .. })));
        assert!(matches!(parse_pattern("[D{3-1}]"), Err(PatternSyntaxError::InvalidRange { .. })));
        assert!(matches!(parse_pattern("[$(CC]"), Err(PatternSyntaxError::UnclosedRecursive { .. })));
        assert!(matches!(parse_pattern("C="), Err(PatternSyntaxError::UnexpectedEnd { .. })));
        assert!(matches!(parse_pattern("CQ"), Err(PatternSyntaxError::UnexpectedChar { .. })));
    }
}
