//! Decoding of the inferior's debug information.
//!
//! [`DebugInfo`] is built once from the ELF file on disk and is immutable
//! afterwards. It combines four views of the binary:
//!
//! - a line table collected from every compile unit's DWARF line-number
//!   program (PC ↔ source line, `is_stmt` and `prologue_end` flags),
//! - the DWARF subprogram tree with the variables each function declares,
//! - the ELF symbol table's function symbols (name → entry address),
//! - the call-frame information from `.debug_frame`, used to materialize the
//!   CFA for a stopped PC from the live registers.
//!
//! ASLR is disabled for the inferior and the debuggee is linked without PIE,
//! so every address in here is valid in the running process as-is.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use gimli::Reader;
use gimli::UnwindSection;
use nix::libc::user_regs_struct;
use object::{Object, ObjectSection, ObjectSymbol};
use tracing::{debug, trace, warn};

use crate::errors::{DebuggerError, Result};
use crate::locexpr;
use crate::regs::Register;
use crate::Addr;

// the gimli::Reader we use; fully owned so DebugInfo has no lifetime on it
pub(crate) type GimliReader = gimli::EndianRcSlice<gimli::NativeEndian>;

const REQUIRED_SECTIONS: [&str; 5] = [
    ".text",
    ".symtab",
    ".debug_info",
    ".debug_line",
    ".debug_frame",
];

/// A function from the ELF symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncSym {
    pub name: String,
    /// first instruction of the function
    pub entry: Addr,
    /// one past the last instruction
    pub end: Addr,
}

/// What kind of data object a [`VarSymbol`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Variable,
    Parameter,
}

/// A variable or formal parameter of a subprogram, with its raw DWARF
/// location expression.
#[derive(Debug, Clone)]
pub(crate) struct VarSymbol {
    pub name: String,
    pub type_name: String,
    pub kind: VarKind,
    pub location: Vec<u8>,
}

/// A DWARF subprogram: PC range plus the variables declared inside it.
#[derive(Debug, Clone)]
pub(crate) struct Subprogram {
    pub name: String,
    pub low_pc: Addr,
    pub high_pc: Addr,
    pub frame_base_is_cfa: bool,
    pub variables: Vec<VarSymbol>,
}

/// A local variable resolved to its address in the inferior.
///
/// The address depends on the live register file, so it is computed fresh for
/// every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub type_name: String,
    pub kind: VarKind,
    pub address: Addr,
}

/// One row of the combined line table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineRow {
    pub addr: Addr,
    pub file: usize,
    pub line: u64,
    pub is_stmt: bool,
    pub prologue_end: bool,
    pub end_sequence: bool,
}

/// The line table of the whole binary, rows sorted by address.
#[derive(Debug, Default)]
pub(crate) struct LineTable {
    files: Vec<PathBuf>,
    rows: Vec<LineRow>,
}

impl LineTable {
    fn add_file(&mut self, path: PathBuf) -> usize {
        if let Some(idx) = self.files.iter().position(|p| *p == path) {
            idx
        } else {
            self.files.push(path);
            self.files.len() - 1
        }
    }

    fn push(&mut self, row: LineRow) {
        self.rows.push(row);
    }

    fn finish(&mut self) {
        // at equal addresses an end_sequence marker must lose against the
        // first row of the next sequence
        self.rows.sort_by_key(|r| (r.addr, !r.end_sequence));
    }

    /// The source position the instruction at `pc` belongs to.
    pub fn pc_to_line(&self, pc: Addr) -> Option<(&Path, u64)> {
        let idx = self.rows.partition_point(|r| r.addr <= pc);
        let row = self.rows[..idx].last()?;
        if row.end_sequence {
            return None;
        }
        Some((&self.files[row.file], row.line))
    }

    /// The lowest address marked as a statement begin for `file:line`.
    pub fn first_stmt_addr(&self, file: &Path, line: u64) -> Option<Addr> {
        self.rows
            .iter()
            .find(|r| {
                r.is_stmt && !r.end_sequence && r.line == line && self.files[r.file].ends_with(file)
            })
            .map(|r| r.addr)
    }

    /// The first `prologue_end` row of the function spanning
    /// `[entry, end)`. There must be a row at exactly `entry`.
    pub fn prologue_end_in(&self, entry: Addr, end: Addr) -> Option<Addr> {
        let start = self
            .rows
            .iter()
            .position(|r| r.addr == entry && !r.end_sequence)?;
        self.rows[start..]
            .iter()
            .take_while(|r| r.addr < end)
            .find(|r| r.prologue_end && !r.end_sequence)
            .map(|r| r.addr)
    }

    /// Lowest and highest source line with a statement in `[low, high)`.
    pub fn line_range_in(&self, low: Addr, high: Addr) -> Option<(u64, u64)> {
        let mut range: Option<(u64, u64)> = None;
        for r in &self.rows {
            if r.end_sequence || !r.is_stmt || r.addr < low || r.addr >= high {
                continue;
            }
            range = Some(match range {
                None => (r.line, r.line),
                Some((lo, hi)) => (lo.min(r.line), hi.max(r.line)),
            });
        }
        range
    }
}

/// All debug information of the inferior, read-only after construction.
pub struct DebugInfo {
    lines: LineTable,
    functions: Vec<Subprogram>,
    symbols: Vec<FuncSym>,
    frames: gimli::DebugFrame<GimliReader>,
    etext: Addr,
}

impl DebugInfo {
    /// Parses the debuggee's ELF file.
    ///
    /// # Errors
    ///
    /// Fails with [`DebuggerError::MissingSection`] if one of the required
    /// sections is absent and with the underlying parse error on malformed
    /// content. These are startup errors; the debugger does not launch
    /// without its debug information.
    pub fn build(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let obj = object::File::parse(&*data)?;

        for section in REQUIRED_SECTIONS {
            if obj.section_by_name(section).is_none() {
                return Err(DebuggerError::MissingSection(section));
            }
        }

        let loader = |section: gimli::SectionId| -> std::result::Result<GimliReader, gimli::Error> {
            let data = obj
                .section_by_name(section.name())
                .and_then(|s| s.uncompressed_data().ok())
                .unwrap_or_default();
            Ok(GimliReader::new(Rc::from(data.as_ref()), gimli::NativeEndian))
        };
        let dwarf = gimli::Dwarf::load(loader)?;

        let lines = Self::build_line_table(&dwarf)?;
        let functions = Self::build_subprograms(&dwarf)?;
        let symbols = Self::build_func_symbols(&obj)?;
        let frames = Self::build_frame_section(&obj)?;
        let etext = Self::find_etext(&obj)?;

        debug!(
            "loaded debug info: {} line rows, {} subprograms, {} function symbols, etext {etext}",
            lines.rows.len(),
            functions.len(),
            symbols.len(),
        );

        Ok(Self {
            lines,
            functions,
            symbols,
            frames,
            etext,
        })
    }

    /// The source position the instruction at `pc` belongs to.
    #[must_use]
    pub fn pc_to_line(&self, pc: Addr) -> Option<(&Path, u64)> {
        self.lines.pc_to_line(pc)
    }

    /// The name of the function whose span contains `pc`.
    #[must_use]
    pub fn function_name_at(&self, pc: Addr) -> Option<&str> {
        self.symbols
            .iter()
            .find(|f| f.entry <= pc && pc < f.end)
            .map(|f| f.name.as_str())
    }

    /// Looks a function up by its symbol name.
    ///
    /// # Errors
    ///
    /// Fails with [`DebuggerError::FunctionNotFound`] if no function symbol
    /// has that name.
    pub fn lookup_func(&self, name: &str) -> Result<&FuncSym> {
        self.symbols
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| DebuggerError::FunctionNotFound(name.to_string()))
    }

    /// The first statement boundary after the function's prologue.
    ///
    /// A breakpoint planted on a function symbol must fire after the
    /// register-save/stack-adjust sequence, where the parameters are valid
    /// and the first source statement begins.
    ///
    /// # Errors
    ///
    /// Fails with [`DebuggerError::NoPrologueEnd`] if the line table has no
    /// `prologue_end` row inside the function.
    pub fn prologue_end_address(&self, func: &FuncSym) -> Result<Addr> {
        self.lines
            .prologue_end_in(func.entry, func.end)
            .ok_or_else(|| DebuggerError::NoPrologueEnd(func.name.clone()))
    }

    /// The address of the statement starting at `file:line`.
    ///
    /// When that statement is a function entry, the prologue-end address is
    /// returned instead so the breakpoint fires once the frame is set up.
    ///
    /// # Errors
    ///
    /// Fails with [`DebuggerError::LineNotFound`] if no statement starts at
    /// that position.
    pub fn statement_address(&self, file: &Path, line: u64) -> Result<Addr> {
        let addr = self.lines.first_stmt_addr(file, line).ok_or_else(|| {
            DebuggerError::LineNotFound {
                file: file.to_string_lossy().to_string(),
                line,
            }
        })?;

        if let Some(func) = self.symbols.iter().find(|f| f.entry == addr) {
            trace!("{file:?}:{line} is the entry of {}", func.name);
            return self.prologue_end_address(func);
        }
        Ok(addr)
    }

    /// The `[low_pc, high_pc)` span of the subprogram containing `pc`.
    ///
    /// # Errors
    ///
    /// Fails with [`DebuggerError::NotInFunction`] if no subprogram covers
    /// `pc`.
    pub fn func_span(&self, pc: Addr) -> Result<(Addr, Addr)> {
        self.subprogram_at(pc).map(|f| (f.low_pc, f.high_pc))
    }

    /// First and last source line of the function containing `pc`.
    ///
    /// # Errors
    ///
    /// Fails if no subprogram covers `pc` or the function has no statement
    /// rows at all.
    pub fn func_line_range(&self, pc: Addr) -> Result<(u64, u64)> {
        let (low, high) = self.func_span(pc)?;
        self.lines
            .line_range_in(low, high)
            .ok_or(DebuggerError::NoLineInfo(pc))
    }

    /// End of the inferior's code, used to reject garbage return addresses.
    #[must_use]
    pub fn etext(&self) -> Addr {
        self.etext
    }

    /// Materializes the CFA for `pc` from the call-frame information and the
    /// live registers.
    ///
    /// # Errors
    ///
    /// Fails if no frame-descriptor entry covers `pc` or its rule uses an
    /// unsupported form.
    pub fn cfa_at(&self, pc: Addr, regs: &user_regs_struct) -> Result<Addr> {
        let bases = gimli::BaseAddresses::default();
        let mut ctx = gimli::UnwindContext::new();
        let row = self
            .frames
            .unwind_info_for_address(&bases, &mut ctx, pc.u64(), gimli::DebugFrame::cie_from_offset)
            .map_err(|e| {
                debug!("no unwind info for {pc}: {e}");
                DebuggerError::NoFrameInfo(pc)
            })?;

        match row.cfa() {
            gimli::CfaRule::RegisterAndOffset { register, offset } => {
                let base = Register::try_from(*register)?.read_from(regs);
                Ok(Addr::from(base.wrapping_add_signed(*offset)))
            }
            gimli::CfaRule::Expression(_) => Err(DebuggerError::UnsupportedCfaRule),
        }
    }

    /// Resolves every variable and parameter in scope at `pc` to an address.
    ///
    /// A variable whose location cannot be evaluated is skipped with a
    /// warning; the remaining ones are still reported.
    ///
    /// # Errors
    ///
    /// Fails with [`DebuggerError::NotInFunction`] if no subprogram covers
    /// `pc`.
    pub fn variables_in_scope(
        &self,
        pc: Addr,
        regs: &user_regs_struct,
    ) -> Result<Vec<Variable>> {
        let sub = self.subprogram_at(pc)?;

        let cfa = match self.cfa_at(pc, regs) {
            Ok(cfa) => Some(cfa),
            Err(e) => {
                debug!("could not establish a CFA at {pc}: {e}");
                None
            }
        };
        if !sub.frame_base_is_cfa {
            debug!(
                "frame base of {} is not DW_OP_call_frame_cfa, assuming the CFA anyway",
                sub.name
            );
        }

        let mut out = Vec::with_capacity(sub.variables.len());
        for var in &sub.variables {
            // the frame base equals the CFA for call_frame_cfa frame bases
            match locexpr::evaluate(&var.location, cfa, cfa) {
                Ok(address) => out.push(Variable {
                    name: var.name.clone(),
                    type_name: var.type_name.clone(),
                    kind: var.kind,
                    address,
                }),
                Err(e) => warn!("could not resolve the location of {}: {e}", var.name),
            }
        }
        Ok(out)
    }

    fn subprogram_at(&self, pc: Addr) -> Result<&Subprogram> {
        self.functions
            .iter()
            .find(|f| f.low_pc <= pc && pc < f.high_pc)
            .ok_or(DebuggerError::NotInFunction)
    }

    fn build_line_table(dwarf: &gimli::Dwarf<GimliReader>) -> Result<LineTable> {
        let mut table = LineTable::default();

        let mut units = dwarf.units();
        while let Some(header) = units.next()? {
            let unit = dwarf.unit(header)?;
            let Some(program) = unit.line_program.clone() else {
                continue;
            };

            let mut rows = program.rows();
            while let Some((header, row)) = rows.next_row()? {
                if row.end_sequence() {
                    table.push(LineRow {
                        addr: Addr::from(row.address()),
                        file: 0,
                        line: 0,
                        is_stmt: false,
                        prologue_end: false,
                        end_sequence: true,
                    });
                    continue;
                }

                let Some(file) = row.file(header) else {
                    continue;
                };
                let Some(line) = row.line() else {
                    continue;
                };
                let path = Self::file_entry_path(dwarf, &unit, header, file)?;
                let file = table.add_file(path);
                table.push(LineRow {
                    addr: Addr::from(row.address()),
                    file,
                    line: line.get(),
                    is_stmt: row.is_stmt(),
                    prologue_end: row.prologue_end(),
                    end_sequence: false,
                });
            }
        }

        table.finish();
        Ok(table)
    }

    fn file_entry_path(
        dwarf: &gimli::Dwarf<GimliReader>,
        unit: &gimli::Unit<GimliReader>,
        header: &gimli::LineProgramHeader<GimliReader>,
        file: &gimli::FileEntry<GimliReader>,
    ) -> Result<PathBuf> {
        let mut path = PathBuf::new();
        if let Some(dir) = file.directory(header) {
            path.push(dwarf.attr_string(unit, dir)?.to_string_lossy()?.as_ref());
        }
        path.push(
            dwarf
                .attr_string(unit, file.path_name())?
                .to_string_lossy()?
                .as_ref(),
        );
        if path.is_relative() {
            if let Some(comp_dir) = &unit.comp_dir {
                path = PathBuf::from(comp_dir.to_string_lossy()?.as_ref()).join(path);
            }
        }
        Ok(path)
    }

    fn build_subprograms(dwarf: &gimli::Dwarf<GimliReader>) -> Result<Vec<Subprogram>> {
        let mut subprograms = Vec::new();

        let mut units = dwarf.units();
        while let Some(header) = units.next()? {
            let unit = dwarf.unit(header)?;
            let mut tree = unit.entries_tree(None)?;
            let root = tree.root()?;

            let mut children = root.children();
            while let Some(node) = children.next()? {
                if node.entry().tag() != gimli::DW_TAG_subprogram {
                    continue;
                }
                match Self::parse_subprogram(dwarf, &unit, node) {
                    Ok(Some(sub)) => subprograms.push(sub),
                    Ok(None) => {}
                    Err(e) => debug!("skipping an unparsable subprogram: {e}"),
                }
            }
        }

        Ok(subprograms)
    }

    fn parse_subprogram(
        dwarf: &gimli::Dwarf<GimliReader>,
        unit: &gimli::Unit<GimliReader>,
        node: gimli::EntriesTreeNode<'_, '_, '_, GimliReader>,
    ) -> Result<Option<Subprogram>> {
        let entry = node.entry();
        let name = Self::parse_string(dwarf, unit, entry.attr(gimli::DW_AT_name)?)?;
        let low = Self::parse_addr(dwarf, unit, entry.attr(gimli::DW_AT_low_pc)?)?;
        let high = Self::parse_high_pc(dwarf, unit, entry.attr(gimli::DW_AT_high_pc)?, low)?;

        let (Some(name), Some(low_pc), Some(high_pc)) = (name, low, high) else {
            // declarations and inlined instances carry no full span
            return Ok(None);
        };

        let frame_base_is_cfa = match entry.attr_value(gimli::DW_AT_frame_base)? {
            Some(gimli::AttributeValue::Exprloc(e)) => {
                e.0.to_slice()?.first() == Some(&gimli::DW_OP_call_frame_cfa.0)
            }
            _ => false,
        };

        let mut variables = Vec::new();
        Self::collect_variables(dwarf, unit, node, &mut variables)?;

        Ok(Some(Subprogram {
            name,
            low_pc,
            high_pc,
            frame_base_is_cfa,
            variables,
        }))
    }

    fn collect_variables(
        dwarf: &gimli::Dwarf<GimliReader>,
        unit: &gimli::Unit<GimliReader>,
        node: gimli::EntriesTreeNode<'_, '_, '_, GimliReader>,
        out: &mut Vec<VarSymbol>,
    ) -> Result<()> {
        let mut children = node.children();
        while let Some(child) = children.next()? {
            let tag = child.entry().tag();
            let kind = match tag {
                gimli::DW_TAG_variable => Some(VarKind::Variable),
                gimli::DW_TAG_formal_parameter => Some(VarKind::Parameter),
                _ => None,
            };
            match kind {
                Some(kind) => {
                    if let Some(var) = Self::parse_variable(dwarf, unit, child.entry(), kind)? {
                        out.push(var);
                    }
                }
                // descend into lexical blocks
                None => Self::collect_variables(dwarf, unit, child, out)?,
            }
        }
        Ok(())
    }

    fn parse_variable(
        dwarf: &gimli::Dwarf<GimliReader>,
        unit: &gimli::Unit<GimliReader>,
        entry: &gimli::DebuggingInformationEntry<'_, '_, GimliReader>,
        kind: VarKind,
    ) -> Result<Option<VarSymbol>> {
        let Some(name) = Self::parse_string(dwarf, unit, entry.attr(gimli::DW_AT_name)?)? else {
            return Ok(None);
        };

        let location = match entry.attr_value(gimli::DW_AT_location)? {
            Some(gimli::AttributeValue::Exprloc(e)) => e.0.to_slice()?.to_vec(),
            Some(other) => {
                trace!("variable {name} has a non-exprloc location {other:?}, skipping");
                return Ok(None);
            }
            None => return Ok(None),
        };

        let type_name = match entry.attr_value(gimli::DW_AT_type)? {
            Some(gimli::AttributeValue::UnitRef(offset)) => {
                Self::type_name(dwarf, unit, offset, 0)?
            }
            _ => "void".to_string(),
        };

        Ok(Some(VarSymbol {
            name,
            type_name,
            kind,
            location,
        }))
    }

    fn type_name(
        dwarf: &gimli::Dwarf<GimliReader>,
        unit: &gimli::Unit<GimliReader>,
        offset: gimli::UnitOffset<usize>,
        depth: usize,
    ) -> Result<String> {
        if depth > 8 {
            return Ok("...".to_string());
        }

        let entry = unit.entry(offset)?;
        let name = Self::parse_string(dwarf, unit, entry.attr(gimli::DW_AT_name)?)?;
        let inner = match entry.attr_value(gimli::DW_AT_type)? {
            Some(gimli::AttributeValue::UnitRef(inner)) => Some(inner),
            _ => None,
        };
        let inner_name = |inner: Option<gimli::UnitOffset<usize>>| -> Result<String> {
            match inner {
                Some(offset) => Self::type_name(dwarf, unit, offset, depth + 1),
                None => Ok("void".to_string()),
            }
        };

        Ok(match entry.tag() {
            gimli::DW_TAG_pointer_type => format!("*{}", inner_name(inner)?),
            gimli::DW_TAG_const_type => format!("const {}", inner_name(inner)?),
            gimli::DW_TAG_volatile_type => format!("volatile {}", inner_name(inner)?),
            gimli::DW_TAG_array_type => format!("{}[]", inner_name(inner)?),
            gimli::DW_TAG_structure_type => {
                format!("struct {}", name.unwrap_or_else(|| "<anonymous>".into()))
            }
            gimli::DW_TAG_union_type => {
                format!("union {}", name.unwrap_or_else(|| "<anonymous>".into()))
            }
            gimli::DW_TAG_enumeration_type => {
                format!("enum {}", name.unwrap_or_else(|| "<anonymous>".into()))
            }
            _ => name.unwrap_or_else(|| "<unknown>".into()),
        })
    }

    fn parse_string(
        dwarf: &gimli::Dwarf<GimliReader>,
        unit: &gimli::Unit<GimliReader>,
        attribute: Option<gimli::Attribute<GimliReader>>,
    ) -> Result<Option<String>> {
        Ok(match attribute {
            Some(a) => Some(
                dwarf
                    .attr_string(unit, a.value())?
                    .to_string_lossy()?
                    .to_string(),
            ),
            None => None,
        })
    }

    fn parse_addr(
        dwarf: &gimli::Dwarf<GimliReader>,
        unit: &gimli::Unit<GimliReader>,
        attribute: Option<gimli::Attribute<GimliReader>>,
    ) -> Result<Option<Addr>> {
        Ok(match attribute {
            Some(a) => dwarf.attr_address(unit, a.value())?.map(Addr::from),
            None => None,
        })
    }

    fn parse_high_pc(
        dwarf: &gimli::Dwarf<GimliReader>,
        unit: &gimli::Unit<GimliReader>,
        attribute: Option<gimli::Attribute<GimliReader>>,
        low: Option<Addr>,
    ) -> Result<Option<Addr>> {
        let Some(attr) = attribute else {
            return Ok(None);
        };
        if let Some(addr) = dwarf.attr_address(unit, attr.value())? {
            return Ok(Some(Addr::from(addr)));
        }
        match attr.value().udata_value() {
            Some(offset) => {
                let low = low.ok_or(DebuggerError::HighPcWithoutLowPc)?;
                Ok(Some(low + offset as usize))
            }
            None => Ok(None),
        }
    }

    fn build_func_symbols(obj: &object::File<'_>) -> Result<Vec<FuncSym>> {
        let mut funcs = Vec::new();
        for sym in obj.symbols() {
            if sym.kind() != object::SymbolKind::Text || sym.size() == 0 {
                continue;
            }
            funcs.push(FuncSym {
                name: sym.name()?.to_string(),
                entry: Addr::from(sym.address()),
                end: Addr::from(sym.address() + sym.size()),
            });
        }
        funcs.sort_by_key(|f| f.entry);
        Ok(funcs)
    }

    fn build_frame_section(obj: &object::File<'_>) -> Result<gimli::DebugFrame<GimliReader>> {
        let section = obj
            .section_by_name(".debug_frame")
            .ok_or(DebuggerError::MissingSection(".debug_frame"))?;
        let data = section.uncompressed_data()?;
        let reader = GimliReader::new(Rc::from(data.as_ref()), gimli::NativeEndian);
        let mut frames = gimli::DebugFrame::from(reader);
        frames.set_address_size(8);
        Ok(frames)
    }

    fn find_etext(obj: &object::File<'_>) -> Result<Addr> {
        for sym in obj.symbols() {
            if matches!(sym.name(), Ok("_etext" | "etext")) {
                return Ok(Addr::from(sym.address()));
            }
        }
        // some linker scripts drop the sentinel; the end of .text is the
        // same boundary
        let text = obj
            .section_by_name(".text")
            .ok_or(DebuggerError::MissingSection(".text"))?;
        Ok(Addr::from(text.address() + text.size()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn row(addr: usize, line: u64, is_stmt: bool, prologue_end: bool) -> LineRow {
        LineRow {
            addr: Addr::from(addr),
            file: 0,
            line,
            is_stmt,
            prologue_end,
            end_sequence: false,
        }
    }

    fn end_row(addr: usize) -> LineRow {
        LineRow {
            addr: Addr::from(addr),
            file: 0,
            line: 0,
            is_stmt: false,
            prologue_end: false,
            end_sequence: true,
        }
    }

    /// main at lines 5..9, helper at lines 11..13, like a small C program
    /// compiled at -O0.
    fn sample_table() -> LineTable {
        let mut table = LineTable::default();
        table.add_file(PathBuf::from("/home/user/hello.c"));
        for r in [
            row(0x401000, 5, true, false), // main entry
            row(0x401008, 6, true, true),  // prologue end
            row(0x40100c, 6, false, false),
            row(0x401010, 7, true, false),
            row(0x401018, 8, true, false),
            row(0x401020, 9, true, false),
            end_row(0x401028),
            row(0x401030, 11, true, false), // helper entry
            row(0x401034, 12, true, true),
            row(0x401038, 13, true, false),
            end_row(0x401040),
        ] {
            table.push(r);
        }
        table.finish();
        table
    }

    fn sample_info() -> DebugInfo {
        let empty: &[u8] = &[];
        let empty = GimliReader::new(Rc::from(empty), gimli::NativeEndian);
        let mut frames = gimli::DebugFrame::from(empty);
        frames.set_address_size(8);
        DebugInfo {
            lines: sample_table(),
            functions: vec![
                Subprogram {
                    name: "main".into(),
                    low_pc: Addr::from(0x401000usize),
                    high_pc: Addr::from(0x401028usize),
                    frame_base_is_cfa: true,
                    variables: vec![VarSymbol {
                        name: "foo".into(),
                        type_name: "int".into(),
                        kind: VarKind::Variable,
                        location: vec![0x91, 0x70], // fbreg -16
                    }],
                },
                Subprogram {
                    name: "helper".into(),
                    low_pc: Addr::from(0x401030usize),
                    high_pc: Addr::from(0x401040usize),
                    frame_base_is_cfa: true,
                    variables: Vec::new(),
                },
            ],
            symbols: vec![
                FuncSym {
                    name: "main".into(),
                    entry: Addr::from(0x401000usize),
                    end: Addr::from(0x401028usize),
                },
                FuncSym {
                    name: "helper".into(),
                    entry: Addr::from(0x401030usize),
                    end: Addr::from(0x401040usize),
                },
            ],
            frames,
            etext: Addr::from(0x401040usize),
        }
    }

    #[test]
    fn test_pc_to_line() {
        let table = sample_table();
        let (file, line) = table.pc_to_line(Addr::from(0x401009usize)).unwrap();
        assert_eq!(file, Path::new("/home/user/hello.c"));
        assert_eq!(line, 6);

        // exact row addresses
        assert_eq!(table.pc_to_line(Addr::from(0x401000usize)).unwrap().1, 5);
        assert_eq!(table.pc_to_line(Addr::from(0x401030usize)).unwrap().1, 11);

        // before any code and past the end of a sequence
        assert!(table.pc_to_line(Addr::from(0x400fffusize)).is_none());
        assert!(table.pc_to_line(Addr::from(0x401028usize)).is_none());
    }

    #[test]
    fn test_first_stmt_addr_matches_by_file_name() {
        let table = sample_table();
        assert_eq!(
            table.first_stmt_addr(Path::new("hello.c"), 7),
            Some(Addr::from(0x401010usize))
        );
        assert_eq!(
            table.first_stmt_addr(Path::new("/home/user/hello.c"), 7),
            Some(Addr::from(0x401010usize))
        );
        assert_eq!(table.first_stmt_addr(Path::new("other.c"), 7), None);
        assert_eq!(table.first_stmt_addr(Path::new("hello.c"), 99), None);
    }

    #[test]
    fn test_statement_addr_skips_non_statement_rows() {
        // line 6 has a mid-expression row at 0x40100c, the statement row wins
        let table = sample_table();
        assert_eq!(
            table.first_stmt_addr(Path::new("hello.c"), 6),
            Some(Addr::from(0x401008usize))
        );
    }

    #[test]
    fn test_prologue_end() {
        let table = sample_table();
        assert_eq!(
            table.prologue_end_in(Addr::from(0x401000usize), Addr::from(0x401028usize)),
            Some(Addr::from(0x401008usize))
        );
        assert_eq!(
            table.prologue_end_in(Addr::from(0x401030usize), Addr::from(0x401040usize)),
            Some(Addr::from(0x401034usize))
        );
        // no row at that exact entry address
        assert_eq!(
            table.prologue_end_in(Addr::from(0x401004usize), Addr::from(0x401028usize)),
            None
        );
    }

    #[test]
    fn test_line_range() {
        let table = sample_table();
        assert_eq!(
            table.line_range_in(Addr::from(0x401000usize), Addr::from(0x401028usize)),
            Some((5, 9))
        );
        assert_eq!(
            table.line_range_in(Addr::from(0x401030usize), Addr::from(0x401040usize)),
            Some((11, 13))
        );
        assert_eq!(
            table.line_range_in(Addr::from(0x500000usize), Addr::from(0x500010usize)),
            None
        );
    }

    #[test]
    fn test_lookup_func() {
        let info = sample_info();
        assert_eq!(
            info.lookup_func("helper").unwrap().entry,
            Addr::from(0x401030usize)
        );
        assert!(matches!(
            info.lookup_func("nonexistent"),
            Err(DebuggerError::FunctionNotFound(_))
        ));
    }

    #[test]
    fn test_function_breakpoint_lands_after_prologue() {
        let info = sample_info();
        let main = info.lookup_func("main").unwrap();
        assert_eq!(
            info.prologue_end_address(main).unwrap(),
            Addr::from(0x401008usize)
        );
    }

    #[test]
    fn test_statement_address_on_entry_line_skips_prologue() {
        let info = sample_info();
        // line 5 is main's entry; the breakpoint must land at the prologue end
        assert_eq!(
            info.statement_address(Path::new("hello.c"), 5).unwrap(),
            Addr::from(0x401008usize)
        );
        // an ordinary line resolves directly
        assert_eq!(
            info.statement_address(Path::new("hello.c"), 8).unwrap(),
            Addr::from(0x401018usize)
        );
        assert!(matches!(
            info.statement_address(Path::new("hello.c"), 99),
            Err(DebuggerError::LineNotFound { .. })
        ));
    }

    #[test]
    fn test_func_span_and_line_range() {
        let info = sample_info();
        assert_eq!(
            info.func_span(Addr::from(0x401012usize)).unwrap(),
            (Addr::from(0x401000usize), Addr::from(0x401028usize))
        );
        assert_eq!(
            info.func_line_range(Addr::from(0x401012usize)).unwrap(),
            (5, 9)
        );
        assert!(matches!(
            info.func_span(Addr::from(0x500000usize)),
            Err(DebuggerError::NotInFunction)
        ));
    }

    #[test]
    fn test_function_name_at() {
        let info = sample_info();
        assert_eq!(
            info.function_name_at(Addr::from(0x401034usize)),
            Some("helper")
        );
        assert_eq!(info.function_name_at(Addr::from(0x500000usize)), None);
    }

    #[test]
    fn test_variables_without_cfa_are_skipped() {
        // the empty .debug_frame yields no CFA, so the fbreg local cannot be
        // resolved and the query reports nothing rather than failing
        let info = sample_info();
        let regs: user_regs_struct = unsafe { std::mem::zeroed() };
        let vars = info
            .variables_in_scope(Addr::from(0x401010usize), &regs)
            .unwrap();
        assert!(vars.is_empty());

        assert!(matches!(
            info.variables_in_scope(Addr::from(0x500000usize), &regs),
            Err(DebuggerError::NotInFunction)
        ));
    }
}
