// layout.rs — Target data layout: ABI alignment and type sizes
//
// Defaults follow x86-64 (`i64:64`, `f64:64`, 64-bit pointers). A module's
// `target datalayout` string overrides individual entries using the LLVM
// spelling, with sizes and alignments in bits.
//
// Preconditions: none.
// Postconditions: every query returns a non-zero alignment.
// Failure modes: malformed layout entries are reported and ignored.
// Side effects: none.

use std::collections::BTreeMap;

use crate::ir::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct DataLayout {
    /// Integer width in bits → ABI alignment in bytes.
    int_align: BTreeMap<u32, u32>,
    float_align: u32,
    double_align: u32,
    pointer_bits: u32,
    pointer_align: u32,
}

impl Default for DataLayout {
    fn default() -> Self {
        let int_align = [(1, 1), (8, 1), (16, 2), (32, 4), (64, 8)]
            .into_iter()
            .collect();
        DataLayout {
            int_align,
            float_align: 4,
            double_align: 8,
            pointer_bits: 64,
            pointer_align: 8,
        }
    }
}

impl DataLayout {
    /// Apply a layout string on top of the defaults. Unrecognized entries are
    /// returned as messages; recognized ones still take effect.
    pub fn parse(spec: &str) -> (DataLayout, Vec<String>) {
        let mut layout = DataLayout::default();
        let mut problems = Vec::new();
        for entry in spec.split('-').filter(|e| !e.is_empty()) {
            if let Err(msg) = layout.apply_entry(entry) {
                problems.push(msg);
            }
        }
        (layout, problems)
    }

    fn apply_entry(&mut self, entry: &str) -> Result<(), String> {
        let bits = |s: &str| -> Result<u32, String> {
            s.parse::<u32>()
                .map_err(|_| format!("invalid number `{s}` in layout entry `{entry}`"))
        };
        let bytes = |s: &str| -> Result<u32, String> {
            let b = bits(s)?;
            if b == 0 || b % 8 != 0 {
                return Err(format!("alignment `{s}` in `{entry}` is not a byte multiple"));
            }
            Ok(b / 8)
        };

        let parts: Vec<&str> = entry.split(':').collect();
        match parts.as_slice() {
            [p, size, align, ..] if p.starts_with('p') => {
                self.pointer_bits = bits(size)?;
                self.pointer_align = bytes(align)?;
            }
            [head, align, ..] if head.starts_with('i') => {
                let width = bits(&head[1..])?;
                self.int_align.insert(width, bytes(align)?);
            }
            [head, align, ..] if head.starts_with('f') => match bits(&head[1..])? {
                32 => self.float_align = bytes(align)?,
                64 => self.double_align = bytes(align)?,
                other => return Err(format!("unsupported float width {other} in `{entry}`")),
            },
            // Endianness, stack, mangling and native-width entries do not
            // affect alignment.
            [head, ..]
                if matches!(
                    head.chars().next(),
                    Some('e' | 'E' | 'S' | 'm' | 'n' | 'a' | 'A' | 'P' | 'G')
                ) => {}
            _ => return Err(format!("unrecognized layout entry `{entry}`")),
        }
        Ok(())
    }

    /// ABI alignment in bytes.
    pub fn abi_align(&self, ty: &Type) -> u32 {
        match ty {
            Type::Void => 1,
            Type::Int(bits) => self.int_align_for(*bits),
            Type::Float => self.float_align,
            Type::Double => self.double_align,
            Type::Ptr(_) => self.pointer_align,
            Type::Array(_, elem) => self.abi_align(elem),
            Type::Struct(s) => s.fields.iter().map(|f| self.abi_align(f)).max().unwrap_or(1),
        }
    }

    fn int_align_for(&self, bits: u32) -> u32 {
        if let Some(a) = self.int_align.get(&bits) {
            return *a;
        }
        // Widths without an entry use the next larger listed width, or the
        // largest listed one.
        self.int_align
            .range(bits..)
            .next()
            .or_else(|| self.int_align.iter().next_back())
            .map(|(_, a)| *a)
            .unwrap_or(1)
    }

    /// Allocation size in bits, including tail padding.
    pub fn size_in_bits(&self, ty: &Type) -> u64 {
        match ty {
            Type::Void => 0,
            Type::Int(bits) => {
                let align = self.int_align_for(*bits) as u64 * 8;
                round_up(*bits as u64, align.max(8))
            }
            Type::Float => 32,
            Type::Double => 64,
            Type::Ptr(_) => self.pointer_bits as u64,
            Type::Array(n, elem) => n * self.size_in_bits(elem),
            Type::Struct(s) => {
                let mut offset = 0u64;
                for field in &s.fields {
                    offset = round_up(offset, self.abi_align(field) as u64 * 8);
                    offset += self.size_in_bits(field);
                }
                round_up(offset, self.abi_align(ty) as u64 * 8)
            }
        }
    }

    /// Bit offset of field `index` inside a struct, or of element `index`
    /// inside an array.
    pub fn field_offset_bits(&self, ty: &Type, index: u64) -> Option<u64> {
        match ty {
            Type::Struct(s) => {
                let index = usize::try_from(index).ok()?;
                if index >= s.fields.len() {
                    return None;
                }
                let mut offset = 0u64;
                for (i, field) in s.fields.iter().enumerate() {
                    offset = round_up(offset, self.abi_align(field) as u64 * 8);
                    if i == index {
                        return Some(offset);
                    }
                    offset += self.size_in_bits(field);
                }
                None
            }
            Type::Array(n, elem) if index < *n => Some(index * self.size_in_bits(elem)),
            _ => None,
        }
    }
}

fn round_up(v: u64, to: u64) -> u64 {
    if to == 0 {
        v
    } else {
        v.div_ceil(to) * to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::StructType;

    fn pair() -> Type {
        Type::Struct(StructType {
            name: Some("struct.Parts".into()),
            fields: vec![Type::Int(32), Type::Int(32)],
        })
    }

    #[test]
    fn default_alignments() {
        let dl = DataLayout::default();
        assert_eq!(dl.abi_align(&Type::Int(32)), 4);
        assert_eq!(dl.abi_align(&Type::Double), 8);
        assert_eq!(dl.abi_align(&Type::ptr_to(Type::Int(8))), 8);
        assert_eq!(dl.abi_align(&Type::Array(10, Box::new(Type::Int(16)))), 2);
    }

    #[test]
    fn struct_alignment_is_max_field_alignment() {
        let dl = DataLayout::default();
        let s = Type::Struct(StructType {
            name: None,
            fields: vec![Type::Int(8), Type::Double],
        });
        assert_eq!(dl.abi_align(&s), 8);
        assert_eq!(dl.size_in_bits(&s), 128);
        assert_eq!(dl.field_offset_bits(&s, 1), Some(64));
    }

    #[test]
    fn lane_offsets_of_word_pair() {
        let dl = DataLayout::default();
        assert_eq!(dl.field_offset_bits(&pair(), 0), Some(0));
        assert_eq!(dl.field_offset_bits(&pair(), 1), Some(32));
        assert_eq!(dl.field_offset_bits(&pair(), 2), None);
    }

    #[test]
    fn layout_string_overrides_defaults() {
        let (dl, problems) = DataLayout::parse("e-i64:32-f64:32-p:32:32");
        assert!(problems.is_empty(), "{problems:?}");
        assert_eq!(dl.abi_align(&Type::Int(64)), 4);
        assert_eq!(dl.abi_align(&Type::Double), 4);
        assert_eq!(dl.size_in_bits(&Type::ptr_to(Type::Double)), 32);
    }

    #[test]
    fn malformed_entries_are_reported() {
        let (dl, problems) = DataLayout::parse("i32:abc-zz");
        assert_eq!(problems.len(), 2);
        assert_eq!(dl, DataLayout::default());
    }

    #[test]
    fn odd_integer_width_uses_next_entry() {
        let dl = DataLayout::default();
        assert_eq!(dl.abi_align(&Type::Int(24)), 4);
        assert_eq!(dl.abi_align(&Type::Int(128)), 8);
    }
}
