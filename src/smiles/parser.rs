use std::collections::BTreeMap;

use crate::atom::{Atom, AtomId};
use crate::bond::BondOrder;
use crate::element::Element;
use crate::graph::{MoleculeBuilder, MoleculeGraph};
use crate::rings::RingInfo;
use crate::valence::default_hydrogens;

use super::error::ParseError;

struct PendingAtom {
    element: Element,
    aromatic: bool,
    charge: i8,
    isotope: u16,
    hydrogens: Option<u8>,
}

struct PendingBond {
    a: usize,
    b: usize,
    order: Option<BondOrder>,
}

struct RingOpen {
    atom: usize,
    order: Option<BondOrder>,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    atoms: Vec<PendingAtom>,
    bonds: Vec<PendingBond>,
    rings: BTreeMap<u16, RingOpen>,
    branches: Vec<(usize, usize)>,
    prev: Option<usize>,
    bond: Option<BondOrder>,
}

pub(crate) fn parse_smiles(input: &str) -> Result<MoleculeGraph, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    let mut parser = Parser {
        chars: trimmed.chars().collect(),
        pos: 0,
        atoms: Vec::new(),
        bonds: Vec::new(),
        rings: BTreeMap::new(),
        branches: Vec::new(),
        prev: None,
        bond: None,
    };
    parser.run()?;
    parser.finish()
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Some(ch) => ParseError::UnexpectedChar { pos: self.pos, ch },
            None => ParseError::UnexpectedEnd,
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.peek() {
            match c {
                '(' => {
                    let Some(prev) = self.prev else {
                        return Err(self.unexpected());
                    };
                    if self.bond.is_some() {
                        return Err(self.unexpected());
                    }
                    self.branches.push((prev, self.pos));
                    self.pos += 1;
                }
                ')' => {
                    let Some((anchor, _)) = self.branches.pop() else {
                        return Err(ParseError::UnmatchedParen { pos: self.pos });
                    };
                    if self.bond.is_some() {
                        return Err(self.unexpected());
                    }
                    self.prev = Some(anchor);
                    self.pos += 1;
                }
                '.' => {
                    if self.bond.is_some() || self.prev.is_none() {
                        return Err(self.unexpected());
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                '-' | '=' | '#' | ':' | '/' | '\\' => {
                    if self.bond.is_some() || self.prev.is_none() {
                        return Err(self.unexpected());
                    }
                    self.bond = Some(match c {
                        '=' => BondOrder::Double,
                        '#' => BondOrder::Triple,
                        ':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    });
                    self.pos += 1;
                }
                '0'..='9' | '%' => self.ring_closure()?,
                '[' => {
                    let atom = self.bracket_atom()?;
                    self.push_atom(atom);
                }
                _ => {
                    let atom = self.bare_atom()?;
                    self.push_atom(atom);
                }
            }
        }

        if self.bond.is_some() {
            return Err(ParseError::UnexpectedEnd);
        }
        if let Some(&(_, pos)) = self.branches.last() {
            return Err(ParseError::UnmatchedParen { pos });
        }
        if let Some((&digit, _)) = self.rings.iter().next() {
            return Err(ParseError::UnclosedRing { digit });
        }
        Ok(())
    }

    fn push_atom(&mut self, atom: PendingAtom) {
        let idx = self.atoms.len();
        self.atoms.push(atom);
        if let Some(prev) = self.prev {
            self.bonds.push(PendingBond {
                a: prev,
                b: idx,
                order: self.bond.take(),
            });
        }
        self.prev = Some(idx);
    }

    fn ring_closure(&mut self) -> Result<(), ParseError> {
        let Some(current) = self.prev else {
            return Err(self.unexpected());
        };
        let digit = self.ring_digit()?;
        let order = self.bond.take();
        match self.rings.remove(&digit) {
            Some(open) => {
                let order = match (open.order, order) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(ParseError::RingBondConflict { digit })
                    }
                    (a, b) => a.or(b),
                };
                self.bonds.push(PendingBond {
                    a: open.atom,
                    b: current,
                    order,
                });
            }
            None => {
                self.rings.insert(
                    digit,
                    RingOpen {
                        atom: current,
                        order,
                    },
                );
            }
        }
        Ok(())
    }

    fn ring_digit(&mut self) -> Result<u16, ParseError> {
        let start = self.pos;
        match self.peek() {
            Some(d @ '0'..='9') => {
                self.pos += 1;
                Ok(d as u16 - '0' as u16)
            }
            Some('%') => {
                self.pos += 1;
                if self.peek() == Some('(') {
                    self.pos += 1;
                    let value = self.number()?.ok_or_else(|| self.unexpected())?;
                    if self.peek() != Some(')') {
                        return Err(self.unexpected());
                    }
                    self.pos += 1;
                    return u16::try_from(value)
                        .map_err(|_| ParseError::NumberOverflow { pos: start });
                }
                let (Some(a), Some(b)) = (self.peek(), self.peek_at(1)) else {
                    return Err(ParseError::UnexpectedEnd);
                };
                let (Some(a), Some(b)) = (a.to_digit(10), b.to_digit(10)) else {
                    return Err(self.unexpected());
                };
                self.pos += 2;
                Ok((a * 10 + b) as u16)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn number(&mut self) -> Result<Option<u32>, ParseError> {
        let start = self.pos;
        let mut value: Option<u32> = None;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            value = Some(
                value
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(d))
                    .ok_or(ParseError::NumberOverflow { pos: start })?,
            );
            self.pos += 1;
        }
        Ok(value)
    }

    fn bare_atom(&mut self) -> Result<PendingAtom, ParseError> {
        let start = self.pos;
        let (symbol, aromatic, len) = match (self.peek(), self.peek_at(1)) {
            (Some('C'), Some('l')) => ("Cl", false, 2),
            (Some('B'), Some('r')) => ("Br", false, 2),
            (Some(c @ ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I')), _) => {
                (upper_symbol(c), false, 1)
            }
            (Some(c @ ('b' | 'c' | 'n' | 'o' | 'p' | 's')), _) => (upper_symbol(c), true, 1),
            (Some(c), _) if c.is_ascii_alphabetic() || c == '*' => {
                return Err(ParseError::InvalidElement {
                    pos: start,
                    text: c.to_string(),
                })
            }
            _ => return Err(self.unexpected()),
        };
        self.pos += len;
        let element = Element::from_symbol(symbol).ok_or_else(|| ParseError::InvalidElement {
            pos: start,
            text: symbol.to_string(),
        })?;
        Ok(PendingAtom {
            element,
            aromatic,
            charge: 0,
            isotope: 0,
            hydrogens: None,
        })
    }

    fn bracket_atom(&mut self) -> Result<PendingAtom, ParseError> {
        let open = self.pos;
        self.pos += 1;

        let isotope = match self.number()? {
            Some(n) => u16::try_from(n).map_err(|_| ParseError::NumberOverflow { pos: open + 1 })?,
            None => 0,
        };
        let (element, aromatic) = self.bracket_element()?;

        while self.peek() == Some('@') {
            self.pos += 1;
        }

        let mut hydrogens = 0u8;
        if self.peek() == Some('H') {
            self.pos += 1;
            let pos = self.pos;
            hydrogens = match self.number()? {
                Some(n) => u8::try_from(n).map_err(|_| ParseError::NumberOverflow { pos })?,
                None => 1,
            };
        }

        let charge = self.charge()?;

        if self.peek() == Some(':') {
            self.pos += 1;
            if self.number()?.is_none() {
                return Err(self.unexpected());
            }
        }

        match self.peek() {
            Some(']') => self.pos += 1,
            None => return Err(ParseError::UnclosedBracket { pos: open }),
            Some(_) => return Err(self.unexpected()),
        }

        Ok(PendingAtom {
            element,
            aromatic,
            charge,
            isotope,
            hydrogens: Some(hydrogens),
        })
    }

    fn bracket_element(&mut self) -> Result<(Element, bool), ParseError> {
        let start = self.pos;
        let first = match self.peek() {
            Some(c) => c,
            None => return Err(ParseError::UnclosedBracket { pos: start.saturating_sub(1) }),
        };
        if first.is_ascii_uppercase() {
            if let Some(second) = self.peek_at(1).filter(|c| c.is_ascii_lowercase()) {
                let two: String = [first, second].iter().collect();
                if let Some(e) = Element::from_symbol(&two) {
                    self.pos += 2;
                    return Ok((e, false));
                }
            }
            if let Some(e) = Element::from_symbol(&first.to_string()) {
                self.pos += 1;
                return Ok((e, false));
            }
        } else if first.is_ascii_lowercase() {
            for len in [2usize, 1] {
                let text: String = self.chars[self.pos..].iter().take(len).collect();
                if text.chars().count() != len {
                    continue;
                }
                if let Some(e) = Element::from_symbol(&capitalize(&text)) {
                    if e.can_be_aromatic() {
                        self.pos += len;
                        return Ok((e, true));
                    }
                }
            }
        }
        Err(ParseError::InvalidElement {
            pos: start,
            text: first.to_string(),
        })
    }

    fn charge(&mut self) -> Result<i8, ParseError> {
        let sign: i8 = match self.peek() {
            Some('+') => 1,
            Some('-') => -1,
            _ => return Ok(0),
        };
        let sign_char = if sign > 0 { '+' } else { '-' };
        let start = self.pos;
        self.pos += 1;
        if let Some(n) = self.number()? {
            let n = i8::try_from(n).map_err(|_| ParseError::InvalidCharge { pos: start })?;
            return Ok(sign * n);
        }
        let mut magnitude: i8 = 1;
        while self.peek() == Some(sign_char) {
            magnitude = magnitude
                .checked_add(1)
                .ok_or(ParseError::InvalidCharge { pos: start })?;
            self.pos += 1;
        }
        Ok(sign * magnitude)
    }

    fn finish(self) -> Result<MoleculeGraph, ParseError> {
        let n = self.atoms.len();
        let mut orders: Vec<BondOrder> = Vec::with_capacity(self.bonds.len());
        let mut implicit_aromatic: Vec<usize> = Vec::new();
        let mut bond_sum = vec![0u8; n];
        for (i, bond) in self.bonds.iter().enumerate() {
            let order = match bond.order {
                Some(order) => order,
                None if self.atoms[bond.a].aromatic && self.atoms[bond.b].aromatic => {
                    implicit_aromatic.push(i);
                    BondOrder::Aromatic
                }
                None => BondOrder::Single,
            };
            bond_sum[bond.a] = bond_sum[bond.a].saturating_add(order.valence_contribution());
            bond_sum[bond.b] = bond_sum[bond.b].saturating_add(order.valence_contribution());
            orders.push(order);
        }

        let mol = self.build(&orders, &bond_sum)?;
        if implicit_aromatic.is_empty() {
            return Ok(mol);
        }

        // An unmarked bond joining two aromatic atoms is aromatic only inside a ring.
        let rings = RingInfo::compute(&mol);
        let mut changed = false;
        for i in implicit_aromatic {
            if !rings.is_ring_bond(petgraph::graph::EdgeIndex::new(i)) {
                orders[i] = BondOrder::Single;
                changed = true;
            }
        }
        if changed {
            self.build(&orders, &bond_sum)
        } else {
            Ok(mol)
        }
    }

    fn build(&self, orders: &[BondOrder], bond_sum: &[u8]) -> Result<MoleculeGraph, ParseError> {
        let mut builder = MoleculeBuilder::new();
        for (i, pending) in self.atoms.iter().enumerate() {
            let hydrogens = pending.hydrogens.unwrap_or_else(|| {
                default_hydrogens(pending.element, pending.aromatic, 0, bond_sum[i])
            });
            builder.add_atom(Atom {
                id: AtomId(i as u32),
                element: pending.element,
                aromatic: pending.aromatic,
                charge: pending.charge,
                hydrogens,
                isotope: pending.isotope,
            });
        }
        for (bond, &order) in self.bonds.iter().zip(orders) {
            builder.add_bond(AtomId(bond.a as u32), AtomId(bond.b as u32), order);
        }
        Ok(builder.build()?)
    }
}

fn upper_symbol(c: char) -> &'static str {
    match c.to_ascii_uppercase() {
        'B' => "B",
        'C' => "C",
        'N' => "N",
        'O' => "O",
        'P' => "P",
        'S' => "S",
        'F' => "F",
        _ => "I",
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
