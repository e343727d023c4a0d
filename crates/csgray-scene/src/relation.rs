//! Compile-time interpreter for array relation programs.
//!
//! A program runs once per array. It only ever sees positions within that
//! array's own `objects` list, which is what lets a library array be
//! instanced anywhere with the same program. The output is positional; the
//! compiler maps positions to arena ids afterwards.
//!
//! Target resolution: `target >= 0` names an element directly, `target ==
//! -1` means the current target moved by `INDEX_ARRAY`. Using `-1` before
//! any `INDEX_ARRAY` is malformed.

use csgray_ir::{RelOp, Relation};
use csgray_trace::TrimKind;

use crate::error::SceneError;

/// What occupies one array position, as far as relations care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// A single surface.
    Surface,
    /// A nested array or instance.
    Array,
    /// A camera or a light: no geometry.
    Other,
}

impl ElementKind {
    fn has_geometry(self) -> bool {
        !matches!(self, ElementKind::Other)
    }
}

/// A trim entry in positional form. Operand positions always hold a
/// surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalTrim {
    /// Discard points inside the surface at this position.
    Outer(usize),
    /// Discard points outside the surface at this position.
    Inner(usize),
    /// Discard points inside the array accumulator.
    Accum,
}

impl LocalTrim {
    /// Constraint kind of this entry.
    pub fn kind(self) -> TrimKind {
        match self {
            LocalTrim::Outer(_) => TrimKind::Outer,
            LocalTrim::Inner(_) => TrimKind::Inner,
            LocalTrim::Accum => TrimKind::Accum,
        }
    }
}

/// Result of running one program.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramOutcome {
    /// Trim entries per position, in program order.
    pub trims: Vec<Vec<LocalTrim>>,
    /// Positions accumulated by `MINUS_ACCUM`, in first-seen order.
    pub accumulator: Vec<usize>,
    /// Whether bounding-volume culling is enabled for the array.
    pub bounded: bool,
    /// Per position, whether it contributes to the array bounding volume.
    pub included: Vec<bool>,
}

impl ProgramOutcome {
    fn new(kinds: &[ElementKind]) -> Self {
        Self {
            trims: vec![Vec::new(); kinds.len()],
            accumulator: Vec::new(),
            bounded: false,
            included: kinds.iter().map(|k| k.has_geometry()).collect(),
        }
    }
}

struct Interpreter<'a> {
    path: &'a str,
    kinds: &'a [ElementKind],
    cursor: Option<usize>,
    out: ProgramOutcome,
}

impl Interpreter<'_> {
    fn malformed(&self, index: usize, reason: impl Into<String>) -> SceneError {
        SceneError::MalformedRelation {
            array: self.path.to_string(),
            index,
            reason: reason.into(),
        }
    }

    fn element(&self, index: usize, pos: i32, role: &str) -> Result<usize, SceneError> {
        if pos < 0 || pos as usize >= self.kinds.len() {
            return Err(self.malformed(
                index,
                format!("{role} {pos} out of range for {} elements", self.kinds.len()),
            ));
        }
        Ok(pos as usize)
    }

    fn target(&self, index: usize, rel: &Relation) -> Result<usize, SceneError> {
        let pos = match rel.target {
            -1 => match self.cursor {
                Some(c) => c as i32,
                None => return Err(self.malformed(index, "target -1 used before any INDEX_ARRAY")),
            },
            t => t,
        };
        let pos = self.element(index, pos, "target")?;
        if !self.kinds[pos].has_geometry() {
            return Err(self.malformed(index, format!("target {pos} has no geometry")));
        }
        Ok(pos)
    }

    fn surface_operand(&self, index: usize, rel: &Relation) -> Result<usize, SceneError> {
        let pos = self.element(index, rel.operand, "operand")?;
        if self.kinds[pos] != ElementKind::Surface {
            return Err(self.malformed(index, format!("operand {pos} is not a surface")));
        }
        Ok(pos)
    }

    fn step(&mut self, index: usize, rel: &Relation) -> Result<(), SceneError> {
        match rel.op {
            RelOp::MinusOuter | RelOp::MinusInner => {
                let target = self.target(index, rel)?;
                let operand = self.surface_operand(index, rel)?;
                if operand == target {
                    return Err(self.malformed(index, "surface subtracts itself"));
                }
                let entry = if rel.op == RelOp::MinusOuter {
                    LocalTrim::Outer(operand)
                } else {
                    LocalTrim::Inner(operand)
                };
                self.out.trims[target].push(entry);
            }
            RelOp::MinusAccum => {
                let target = self.target(index, rel)?;
                if rel.operand >= 0 {
                    let operand = self.surface_operand(index, rel)?;
                    if !self.out.accumulator.contains(&operand) {
                        self.out.accumulator.push(operand);
                    }
                }
                let list = &mut self.out.trims[target];
                if !list.contains(&LocalTrim::Accum) {
                    list.push(LocalTrim::Accum);
                }
            }
            RelOp::IndexArray => {
                self.cursor = Some(if rel.operand >= 0 {
                    self.element(index, rel.operand, "operand")?
                } else {
                    self.cursor.map_or(0, |c| c + 1)
                });
            }
            RelOp::BoundArray | RelOp::UntieArray => {
                if rel.target != -1 {
                    return Err(self.malformed(index, "array-wide opcode needs target -1"));
                }
                self.out.bounded = rel.op == RelOp::BoundArray;
            }
            RelOp::BoundIndex | RelOp::UntieIndex => {
                let pos = if rel.operand >= 0 {
                    self.element(index, rel.operand, "operand")?
                } else {
                    self.target(index, rel)?
                };
                if !self.kinds[pos].has_geometry() {
                    return Err(self.malformed(index, format!("element {pos} has no bounds")));
                }
                self.out.included[pos] = rel.op == RelOp::BoundIndex;
            }
        }
        Ok(())
    }
}

/// Run the program of the array at `path` whose elements are `kinds`.
pub fn run_program(path: &str, kinds: &[ElementKind], relations: &[Relation]) -> Result<ProgramOutcome, SceneError> {
    let mut interp = Interpreter {
        path,
        kinds,
        cursor: None,
        out: ProgramOutcome::new(kinds),
    };
    for (index, rel) in relations.iter().enumerate() {
        interp.step(index, rel)?;
    }
    Ok(interp.out)
}
