use anyhow::Result;
use colored::Colorize;
use relf_core::registry;
use relf_core::{Binary, Ehdr, Phdr, Shdr};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn heading(title: &str) {
    println!("{}", format!("[ {title} ]").cyan().bold());
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{table}");
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn field(field: &'static str, value: impl ToString) -> FieldRow {
    FieldRow {
        field,
        value: value.to_string(),
    }
}

fn header_rows(ehdr: &Ehdr) -> Vec<FieldRow> {
    let ident = ehdr
        .ident
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ");

    vec![
        field("Ident", ident),
        field("Format", ehdr.format_name()),
        field(
            "Class",
            if ehdr.is_64() { "ELF64" } else { "ELF32" },
        ),
        field(
            "Data",
            if ehdr.is_little_endian() {
                "little endian"
            } else {
                "big endian"
            },
        ),
        field("Type", &ehdr.object_type),
        field("Machine", &ehdr.machine),
        field("Version", &ehdr.version),
        field("Entry point", format!("{:#x}", ehdr.entry)),
        field("Program headers offset", ehdr.phoff),
        field("Section headers offset", ehdr.shoff),
        field("Flags", format!("{:#x}", ehdr.flags)),
        field("Header size", ehdr.ehsize),
        field("Program header size", ehdr.phentsize),
        field("Program header count", ehdr.phnum),
        field("Section header size", ehdr.shentsize),
        field("Section header count", ehdr.shnum),
        field("Section name table index", ehdr.shstrndx),
    ]
}

pub fn header(bin: &Binary, json: bool) -> Result<()> {
    let Some(ehdr) = bin.ehdr() else {
        println!("No ELF header (flat binary).");
        return Ok(());
    };
    if json {
        return print_json(ehdr);
    }
    heading("ELF HEADER");
    print_table(header_rows(ehdr));
    Ok(())
}

#[derive(Tabled)]
struct SectionRow {
    #[tabled(rename = "Nr")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Address")]
    addr: String,
    #[tabled(rename = "Offset")]
    offset: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Flags")]
    flags: String,
}

impl From<&Shdr> for SectionRow {
    fn from(s: &Shdr) -> Self {
        Self {
            index: s.index,
            name: s.name.clone(),
            kind: s.type_name.clone(),
            addr: format!("{:#x}", s.addr),
            offset: format!("{:#x}", s.offset),
            size: format!("{:#x}", s.size),
            flags: s.flag_string(),
        }
    }
}

pub fn sections(bin: &Binary, json: bool) -> Result<()> {
    let shdr = bin.shdr().unwrap_or_default();
    if json {
        return print_json(shdr);
    }
    if shdr.is_empty() {
        println!("No sections found (possibly stripped binary).");
        return Ok(());
    }
    heading("SECTION HEADERS");
    print_table(shdr.iter().map(SectionRow::from).collect());
    Ok(())
}

#[derive(Tabled)]
struct SegmentRow {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Offset")]
    offset: String,
    #[tabled(rename = "VirtAddr")]
    vaddr: String,
    #[tabled(rename = "FileSiz")]
    filesz: String,
    #[tabled(rename = "MemSiz")]
    memsz: String,
    #[tabled(rename = "Flags")]
    flags: String,
    #[tabled(rename = "Align")]
    align: String,
}

impl From<&Phdr> for SegmentRow {
    fn from(p: &Phdr) -> Self {
        Self {
            kind: p.type_name.clone(),
            offset: format!("{:#x}", p.offset),
            vaddr: format!("{:#x}", p.vaddr),
            filesz: format!("{:#x}", p.filesz),
            memsz: format!("{:#x}", p.memsz),
            flags: p.permissions(),
            align: format!("{:#x}", p.align),
        }
    }
}

pub fn segments(bin: &Binary, json: bool) -> Result<()> {
    let phdr = bin.phdr().unwrap_or_default();
    if json {
        return print_json(phdr);
    }
    if phdr.is_empty() {
        println!("No program headers found.");
        return Ok(());
    }
    heading("PROGRAM HEADERS");
    print_table(phdr.iter().map(SegmentRow::from).collect());
    Ok(())
}

#[derive(Serialize)]
struct Summary<'a> {
    fname: Option<&'a str>,
    size: usize,
    alloc_type: String,
    arch: String,
    entry: Option<u64>,
    segments: usize,
    sections: usize,
}

pub fn info(bin: &Binary, json: bool) -> Result<()> {
    let summary = Summary {
        fname: bin.fname(),
        size: bin.size(),
        alloc_type: bin.alloc_type().to_string(),
        arch: bin.arch().to_string(),
        entry: bin.entry_point(),
        segments: bin.phdr().map_or(0, <[Phdr]>::len),
        sections: bin.shdr().map_or(0, <[Shdr]>::len),
    };
    if json {
        return print_json(&summary);
    }

    heading("BINARY");
    print_table(vec![
        field("File", summary.fname.unwrap_or("-")),
        field("Size", summary.size),
        field("Allocation", summary.alloc_type),
        field("Class", summary.arch),
        field(
            "Entry point",
            summary
                .entry
                .map_or_else(|| "-".to_string(), |e| format!("{e:#x}")),
        ),
        field("Program headers", summary.segments),
        field("Sections", summary.sections),
    ]);
    Ok(())
}

#[derive(Tabled)]
struct ConstantRow {
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

pub fn constants(json: bool) -> Result<()> {
    let constants = registry::constants();
    if json {
        return print_json(constants);
    }
    heading("CONSTANTS");
    print_table(
        constants
            .iter()
            .map(|c| ConstantRow {
                name: c.name,
                value: format!("{:#x}", c.value),
            })
            .collect(),
    );
    Ok(())
}

#[derive(Tabled)]
struct CodeRow {
    #[tabled(rename = "Code")]
    code: u32,
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Message")]
    message: &'static str,
}

pub fn codes(json: bool) -> Result<()> {
    let codes: Vec<_> = registry::result_codes().collect();
    if json {
        return print_json(&codes);
    }
    heading("RESULT CODES");
    print_table(
        codes
            .into_iter()
            .map(|e| CodeRow {
                code: e.code,
                name: e.name,
                message: e.message,
            })
            .collect(),
    );
    Ok(())
}
