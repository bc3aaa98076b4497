use super::{AtomExpr, AtomPrimitive, BondExpr, QueryAtom, QueryBond, SmartsError};
use crate::core::models::element::Element;
use crate::core::models::topology::BondOrder;
use std::collections::BTreeMap;

pub(super) fn parse(source: &str) -> Result<(Vec<QueryAtom>, Vec<QueryBond>), SmartsError> {
    if source.is_empty() {
        return Err(SmartsError::Empty);
    }
    GraphParser::new(source).parse()
}

struct GraphParser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    atoms: Vec<QueryAtom>,
    bonds: Vec<QueryBond>,
    branches: Vec<Option<usize>>,
    previous: Option<usize>,
    pending_bond: Option<(BondExpr, usize)>,
    rings: BTreeMap<u16, (usize, Option<BondExpr>)>,
}

const BOND_CHARS: &[u8] = b"-=#:~@!/\\,&;";

impl<'a> GraphParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            branches: Vec::new(),
            previous: None,
            pending_bond: None,
            rings: BTreeMap::new(),
        }
    }

    fn unexpected(&self, pos: usize) -> SmartsError {
        let ch = self.input[pos..].chars().next().unwrap_or('\0');
        SmartsError::UnexpectedCharacter { ch, pos }
    }

    fn parse(mut self) -> Result<(Vec<QueryAtom>, Vec<QueryBond>), SmartsError> {
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            match c {
                b'(' => {
                    if self.previous.is_none() {
                        return Err(self.unexpected(self.pos));
                    }
                    self.branches.push(self.previous);
                    self.pos += 1;
                }
                b')' => {
                    let restored = self.branches.pop().ok_or(SmartsError::UnbalancedBranch)?;
                    if let Some((_, pos)) = self.pending_bond {
                        return Err(SmartsError::DanglingBond(pos));
                    }
                    self.previous = restored;
                    self.pos += 1;
                }
                b'.' => {
                    if let Some((_, pos)) = self.pending_bond {
                        return Err(SmartsError::DanglingBond(pos));
                    }
                    self.previous = None;
                    self.pos += 1;
                }
                c if BOND_CHARS.contains(&c) => {
                    if self.pending_bond.is_some() {
                        return Err(self.unexpected(self.pos));
                    }
                    let start = self.pos;
                    while self.pos < self.bytes.len() && BOND_CHARS.contains(&self.bytes[self.pos])
                    {
                        self.pos += 1;
                    }
                    let expr = parse_bond_expr(&self.bytes[start..self.pos], start)?;
                    self.pending_bond = Some((expr, start));
                }
                b'0'..=b'9' => {
                    let number = (c - b'0') as u16;
                    self.pos += 1;
                    self.ring_bond(number)?;
                }
                b'%' => {
                    let number = match self.bytes.get(self.pos + 1..self.pos + 3) {
                        Some([a, b]) if a.is_ascii_digit() && b.is_ascii_digit() => {
                            ((a - b'0') * 10 + (b - b'0')) as u16
                        }
                        _ => return Err(self.unexpected(self.pos)),
                    };
                    self.pos += 3;
                    self.ring_bond(number)?;
                }
                b'[' => {
                    let start = self.pos;
                    let close = self.input[start..]
                        .find(']')
                        .map(|offset| start + offset)
                        .ok_or(SmartsError::UnclosedBracket(start))?;
                    let atom = parse_bracket(&self.input[start + 1..close], start + 1)?;
                    self.pos = close + 1;
                    self.add_atom(atom)?;
                }
                _ => {
                    let atom = self.bare_atom()?;
                    self.add_atom(atom)?;
                }
            }
        }

        if !self.branches.is_empty() {
            return Err(SmartsError::UnbalancedBranch);
        }
        if let Some((&number, _)) = self.rings.iter().next() {
            return Err(SmartsError::UnclosedRing(number));
        }
        if let Some((_, pos)) = self.pending_bond {
            return Err(SmartsError::DanglingBond(pos));
        }
        Ok((self.atoms, self.bonds))
    }

    fn add_atom(&mut self, atom: QueryAtom) -> Result<(), SmartsError> {
        let index = self.atoms.len();
        self.atoms.push(atom);
        match (self.previous, self.pending_bond.take()) {
            (Some(previous), explicit) => {
                let expr = explicit.map(|(e, _)| e).unwrap_or(BondExpr::Implicit);
                self.bonds.push(QueryBond {
                    atom1: previous,
                    atom2: index,
                    expr,
                });
            }
            (None, Some((_, pos))) => return Err(SmartsError::DanglingBond(pos)),
            (None, None) => {}
        }
        self.previous = Some(index);
        Ok(())
    }

    fn ring_bond(&mut self, number: u16) -> Result<(), SmartsError> {
        let current = self.previous.ok_or(SmartsError::InvalidRingClosure(number))?;
        let explicit = self.pending_bond.take().map(|(e, _)| e);
        match self.rings.remove(&number) {
            Some((opener, opening_expr)) => {
                if opener == current {
                    return Err(SmartsError::InvalidRingClosure(number));
                }
                let expr = opening_expr.or(explicit).unwrap_or(BondExpr::Implicit);
                self.bonds.push(QueryBond {
                    atom1: opener,
                    atom2: current,
                    expr,
                });
            }
            None => {
                self.rings.insert(number, (current, explicit));
            }
        }
        Ok(())
    }

    fn bare_atom(&mut self) -> Result<QueryAtom, SmartsError> {
        let c = self.bytes[self.pos];
        let next = self.bytes.get(self.pos + 1).copied();
        let (primitive, width) = match (c, next) {
            (b'C', Some(b'l')) => (element(Element::CHLORINE, false), 2),
            (b'B', Some(b'r')) => (element(Element::BROMINE, false), 2),
            (b'*', _) => (AtomPrimitive::Any, 1),
            (b'a', _) => (AtomPrimitive::Aromatic, 1),
            (b'A', _) => (AtomPrimitive::Aliphatic, 1),
            (b'B', _) => (element(Element::BORON, false), 1),
            (b'C', _) => (element(Element::CARBON, false), 1),
            (b'N', _) => (element(Element::NITROGEN, false), 1),
            (b'O', _) => (element(Element::OXYGEN, false), 1),
            (b'P', _) => (element(Element::PHOSPHORUS, false), 1),
            (b'S', _) => (element(Element::SULFUR, false), 1),
            (b'F', _) => (element(Element::FLUORINE, false), 1),
            (b'I', _) => (element(Element::IODINE, false), 1),
            (b'b', _) => (element(Element::BORON, true), 1),
            (b'c', _) => (element(Element::CARBON, true), 1),
            (b'n', _) => (element(Element::NITROGEN, true), 1),
            (b'o', _) => (element(Element::OXYGEN, true), 1),
            (b'p', _) => (element(Element::PHOSPHORUS, true), 1),
            (b's', _) => (element(Element::SULFUR, true), 1),
            (b'$', _) => {
                return Err(SmartsError::Unsupported {
                    feature: "recursive SMARTS",
                    pos: self.pos,
                });
            }
            (c, _) if c.is_ascii_alphabetic() => {
                return Err(SmartsError::UnknownElement {
                    symbol: (c as char).to_string(),
                    pos: self.pos,
                });
            }
            _ => return Err(self.unexpected(self.pos)),
        };
        self.pos += width;
        Ok(QueryAtom {
            expr: AtomExpr::Primitive(primitive),
            map_class: None,
        })
    }
}

fn element(element: Element, aromatic: bool) -> AtomPrimitive {
    AtomPrimitive::Element { element, aromatic }
}

/// Splits `terms` on `separator` and folds them with `combine`, unless there is only
/// one term.
fn split_terms<T>(
    text: &[u8],
    separator: u8,
    offset: usize,
    parse_term: &mut dyn FnMut(&[u8], usize) -> Result<T, SmartsError>,
    combine: fn(Vec<T>) -> T,
) -> Result<T, SmartsError> {
    let mut terms = Vec::new();
    let mut start = 0;
    for (i, &c) in text.iter().enumerate() {
        if c == separator {
            terms.push(parse_term(&text[start..i], offset + start)?);
            start = i + 1;
        }
    }
    terms.push(parse_term(&text[start..], offset + start)?);
    if terms.len() == 1 {
        Ok(terms.remove(0))
    } else {
        Ok(combine(terms))
    }
}

fn parse_bond_expr(text: &[u8], offset: usize) -> Result<BondExpr, SmartsError> {
    split_terms(text, b';', offset, &mut parse_bond_or, BondExpr::And)
}

fn parse_bond_or(text: &[u8], offset: usize) -> Result<BondExpr, SmartsError> {
    split_terms(text, b',', offset, &mut parse_bond_and, BondExpr::Or)
}

fn parse_bond_and(text: &[u8], offset: usize) -> Result<BondExpr, SmartsError> {
    let mut terms = Vec::new();
    let mut negate = false;
    for (i, &c) in text.iter().enumerate() {
        let term = match c {
            b'!' => {
                negate = !negate;
                continue;
            }
            b'&' => continue,
            b'-' | b'/' | b'\\' => BondExpr::Order(BondOrder::Single),
            b'=' => BondExpr::Order(BondOrder::Double),
            b'#' => BondExpr::Order(BondOrder::Triple),
            b':' => BondExpr::Order(BondOrder::Aromatic),
            b'~' => BondExpr::Any,
            b'@' => BondExpr::Ring,
            _ => {
                return Err(SmartsError::UnexpectedCharacter {
                    ch: c as char,
                    pos: offset + i,
                });
            }
        };
        terms.push(if negate {
            BondExpr::Not(Box::new(term))
        } else {
            term
        });
        negate = false;
    }
    if negate || terms.is_empty() {
        return Err(SmartsError::DanglingBond(offset));
    }
    Ok(if terms.len() == 1 {
        terms.remove(0)
    } else {
        BondExpr::And(terms)
    })
}

/// Parses the text between `[` and `]`. `offset` is the position of the first
/// character inside the brackets.
fn parse_bracket(text: &str, offset: usize) -> Result<QueryAtom, SmartsError> {
    let (body, map_class) = match text.rfind(':') {
        Some(colon)
            if colon + 1 < text.len() && text[colon + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            (&text[..colon], text[colon + 1..].parse().ok())
        }
        _ => (text, None),
    };
    if body.is_empty() {
        return Err(SmartsError::UnexpectedCharacter {
            ch: ']',
            pos: offset + text.len(),
        });
    }
    let expr = split_terms(body.as_bytes(), b';', offset, &mut parse_atom_or, AtomExpr::And)?;
    Ok(QueryAtom { expr, map_class })
}

fn parse_atom_or(text: &[u8], offset: usize) -> Result<AtomExpr, SmartsError> {
    split_terms(text, b',', offset, &mut parse_atom_and, AtomExpr::Or)
}

fn parse_atom_and(text: &[u8], offset: usize) -> Result<AtomExpr, SmartsError> {
    let mut lexer = PrimitiveLexer {
        text,
        offset,
        pos: 0,
    };
    let mut terms = Vec::new();
    let mut negate = false;
    while lexer.pos < text.len() {
        match text[lexer.pos] {
            b'!' => {
                negate = !negate;
                lexer.pos += 1;
            }
            b'&' => lexer.pos += 1,
            b'@' => {
                // Chirality is not part of the graph model.
                lexer.pos += 1;
            }
            _ => {
                let primitive = AtomExpr::Primitive(lexer.primitive()?);
                terms.push(if negate {
                    AtomExpr::Not(Box::new(primitive))
                } else {
                    primitive
                });
                negate = false;
            }
        }
    }
    if negate {
        return Err(SmartsError::UnexpectedCharacter {
            ch: '!',
            pos: offset + text.len(),
        });
    }
    Ok(match terms.len() {
        0 => AtomExpr::Primitive(AtomPrimitive::Any),
        1 => terms.remove(0),
        _ => AtomExpr::And(terms),
    })
}

struct PrimitiveLexer<'a> {
    text: &'a [u8],
    offset: usize,
    pos: usize,
}

impl PrimitiveLexer<'_> {
    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.text.get(self.pos + ahead).copied()
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.text[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    fn two_letter_element(&self) -> Option<Element> {
        let first = self.peek_at(0)?;
        let second = self.peek_at(1).filter(u8::is_ascii_lowercase)?;
        let pair = [first, second];
        Element::from_symbol(std::str::from_utf8(&pair).ok()?)
    }

    fn primitive(&mut self) -> Result<AtomPrimitive, SmartsError> {
        let start = self.pos;
        let c = self.text[self.pos];

        if c.is_ascii_uppercase() {
            if let Some(element) = self.two_letter_element() {
                self.pos += 2;
                return Ok(AtomPrimitive::Element {
                    element,
                    aromatic: false,
                });
            }
            self.pos += 1;
            return Ok(match c {
                b'A' => AtomPrimitive::Aliphatic,
                b'H' => AtomPrimitive::TotalHydrogens(self.number().unwrap_or(1) as u8),
                b'D' => AtomPrimitive::Degree(self.number().unwrap_or(1) as u8),
                b'X' => AtomPrimitive::Connectivity(self.number().unwrap_or(1) as u8),
                b'R' => AtomPrimitive::InRing(self.number() != Some(0)),
                _ => {
                    let symbol = [c];
                    let element = std::str::from_utf8(&symbol)
                        .ok()
                        .and_then(Element::from_symbol)
                        .ok_or_else(|| SmartsError::UnknownElement {
                            symbol: (c as char).to_string(),
                            pos: self.offset + start,
                        })?;
                    AtomPrimitive::Element {
                        element,
                        aromatic: false,
                    }
                }
            });
        }

        self.pos += 1;
        Ok(match c {
            b'*' => AtomPrimitive::Any,
            b'#' => {
                let number = self.number().ok_or(SmartsError::UnexpectedCharacter {
                    ch: '#',
                    pos: self.offset + start,
                })?;
                AtomPrimitive::AtomicNumber(number as u8)
            }
            b'+' | b'-' => {
                let unit: i8 = if c == b'+' { 1 } else { -1 };
                match self.number() {
                    Some(magnitude) => AtomPrimitive::Charge(unit * magnitude as i8),
                    None => {
                        let mut charge = unit;
                        while self.peek_at(0) == Some(c) {
                            charge += unit;
                            self.pos += 1;
                        }
                        AtomPrimitive::Charge(charge)
                    }
                }
            }
            b'r' => AtomPrimitive::InRing(self.number() != Some(0)),
            b'a' if self.peek_at(0) == Some(b's') => {
                self.pos += 1;
                aromatic_element("As")
            }
            b's' if self.peek_at(0) == Some(b'e') => {
                self.pos += 1;
                aromatic_element("Se")
            }
            b'a' => AtomPrimitive::Aromatic,
            b'b' => aromatic_element("B"),
            b'c' => aromatic_element("C"),
            b'n' => aromatic_element("N"),
            b'o' => aromatic_element("O"),
            b'p' => aromatic_element("P"),
            b's' => aromatic_element("S"),
            b'$' => {
                return Err(SmartsError::Unsupported {
                    feature: "recursive SMARTS",
                    pos: self.offset + start,
                });
            }
            c if c.is_ascii_alphabetic() => {
                return Err(SmartsError::UnknownElement {
                    symbol: (c as char).to_string(),
                    pos: self.offset + start,
                });
            }
            c => {
                return Err(SmartsError::UnexpectedCharacter {
                    ch: c as char,
                    pos: self.offset + start,
                });
            }
        })
    }
}

fn aromatic_element(symbol: &str) -> AtomPrimitive {
    AtomPrimitive::Element {
        element: Element::from_symbol(symbol).unwrap_or(Element::WILDCARD),
        aromatic: true,
    }
}
