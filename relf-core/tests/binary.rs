mod common;

use common::{sample_elf, write_file, ElfImage, SHSTRTAB, TEXT};
use relf_core::{AllocType, Binary, BinaryClass, BinaryConfig, Error, ResultCode};

fn binary(alloc_type: AllocType, arch: BinaryClass) -> Binary {
    let config = BinaryConfig::new()
        .with_alloc_type(alloc_type)
        .with_arch(arch);
    Binary::with_config(config).unwrap()
}

#[test]
fn opens_sample_executable() {
    let tmp = tempfile::tempdir().unwrap();
    let path = sample_elf(tmp.path());
    let bytes = std::fs::read(&path).unwrap();

    let mut bin = binary(AllocType::Mmap, BinaryClass::Elf);
    bin.open_path(&path).unwrap();

    assert!(bin.is_open());
    assert_eq!(bin.fname(), path.to_str());
    assert_eq!(bin.size(), bytes.len());
    assert_eq!(bin.mem(), Some(bytes.as_slice()));
    assert_eq!(bin.alloc_type(), AllocType::Mmap);
    assert_eq!(bin.arch(), BinaryClass::Elf64);
    #[cfg(unix)]
    assert!(bin.fd() >= 0);

    let ehdr = bin.ehdr().unwrap();
    assert_eq!(ehdr.entry, 0x401000);
    assert_eq!(&ehdr.ident[..4], b"\x7fELF");
    assert_eq!(&ehdr.ident[..], &bytes[..16]);
    assert_eq!(ehdr.object_type.value(), 2);
    assert_eq!(ehdr.object_type.meaning(), Some("Executable file"));
    assert_eq!(ehdr.machine.value(), 62);
    assert_eq!(ehdr.version.name(), "EV_CURRENT");
    assert_eq!(ehdr.phoff, 64);
    assert_eq!(ehdr.phnum, 1);
    assert_eq!(ehdr.shnum, 3);
    assert_eq!(ehdr.shstrndx, 2);
    assert!(ehdr.is_64());
    assert!(ehdr.is_executable());
}

#[test]
fn mirrors_program_and_section_tables() {
    let tmp = tempfile::tempdir().unwrap();
    let path = sample_elf(tmp.path());

    let mut bin = Binary::new();
    bin.open_path(&path).unwrap();

    let phdr = bin.phdr().unwrap();
    assert_eq!(phdr.len(), 1);
    assert_eq!(phdr[0].p_type, 1);
    assert_eq!(phdr[0].type_name, "PT_LOAD");
    assert_eq!(phdr[0].permissions(), "R-X");
    assert_eq!(phdr[0].vaddr, 0x40_0000);

    let shdr = bin.shdr().unwrap();
    let names: Vec<&str> = shdr.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["", ".text", ".shstrtab"]);
    assert_eq!(shdr[1].size, TEXT.len() as u64);
    assert_eq!(shdr[1].flag_string(), "AX");
    assert_eq!(shdr[2].type_name, "SHT_STRTAB");
    assert_eq!(shdr[2].size, SHSTRTAB.len() as u64);
}

#[test]
fn missing_file_is_a_native_not_found() {
    let mut bin = Binary::new();
    let err = bin.open_path("/nonexistent/path").unwrap_err();

    match &err {
        Error::NativeFailure { code, message, path } => {
            assert_eq!(*code, ResultCode::NotFound);
            assert!(!message.is_empty());
            assert_eq!(path.as_deref(), Some("/nonexistent/path"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.code(), Some(2));
    assert!(!bin.is_open());
    assert_eq!(bin.mem(), None);
}

#[test]
fn empty_argument_replaces_the_stored_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = sample_elf(tmp.path());

    let mut bin = Binary::with_config(BinaryConfig::new().with_path(&path)).unwrap();
    let err = bin.open_path("").unwrap_err();

    assert_eq!(err.code(), Some(ResultCode::NotFound.code()));
    assert_eq!(bin.path(), Some(std::path::Path::new("")));
    assert!(matches!(bin.open(), Err(Error::InvalidArgument(_))));
}

#[test]
fn text_file_is_not_an_elf() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(tmp.path(), "passwd", b"root:x:0:0:root:/root:/bin/sh\n");

    let err = Binary::open_file(&path).unwrap_err();
    assert_eq!(err.code(), Some(43));
}

#[test]
fn close_without_open_succeeds() {
    let mut bin = Binary::new();
    bin.close();
    assert_eq!(bin.size(), 0);
    assert_eq!(bin.mem(), Some(&[][..]));
    assert_eq!(bin.fd(), -1);
}

#[test]
fn close_releases_and_reopen_restores() {
    let tmp = tempfile::tempdir().unwrap();
    let path = sample_elf(tmp.path());

    let mut bin = Binary::with_config(BinaryConfig::new().with_path(&path)).unwrap();
    bin.open().unwrap();
    let first = bin.mem_shared().unwrap();
    let size = bin.size();

    bin.close();
    assert!(!bin.is_open());
    assert_eq!(bin.size(), 0);
    assert_eq!(bin.mem(), Some(&[][..]));
    assert!(bin.ehdr().is_none());
    assert!(bin.shdr().is_none());
    assert_eq!(bin.fname(), None);
    // copies taken before the close are unaffected
    assert_eq!(first.len(), size);

    bin.open().unwrap();
    assert_eq!(bin.size(), size);
    assert_eq!(bin.mem_shared().unwrap(), first);
}

#[test]
fn malloc_and_mmap_see_the_same_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let path = sample_elf(tmp.path());

    let mut mapped = binary(AllocType::Mmap, BinaryClass::Elf);
    mapped.open_path(&path).unwrap();
    let mut heap = binary(AllocType::Malloc, BinaryClass::Elf);
    heap.open_path(&path).unwrap();

    assert_eq!(heap.alloc_type(), AllocType::Malloc);
    assert_eq!(mapped.mem(), heap.mem());
    assert_eq!(mapped.ehdr(), heap.ehdr());
    assert_eq!(mapped.shdr(), heap.shdr());
}

#[test]
fn alloc_none_resolves_on_open() {
    let tmp = tempfile::tempdir().unwrap();
    let path = sample_elf(tmp.path());

    let mut bin = binary(AllocType::None, BinaryClass::Elf);
    assert_eq!(bin.alloc_type(), AllocType::None);
    bin.open_path(&path).unwrap();
    assert_eq!(bin.alloc_type(), AllocType::Mmap);
    bin.close();
    assert_eq!(bin.alloc_type(), AllocType::None);
}

#[test]
fn big_endian_elf32_is_decoded() {
    let tmp = tempfile::tempdir().unwrap();
    let image = ElfImage::elf32_be(0x1000_0100);
    let path = write_file(tmp.path(), "ppc.elf", &image.build());

    let mut bin = binary(AllocType::Malloc, BinaryClass::Elf32);
    bin.open_path(&path).unwrap();

    assert_eq!(bin.arch(), BinaryClass::Elf32);
    let ehdr = bin.ehdr().unwrap();
    assert!(!ehdr.is_64());
    assert!(!ehdr.is_little_endian());
    assert_eq!(ehdr.entry, 0x1000_0100);
    assert_eq!(ehdr.ehsize, 52);
    assert_eq!(ehdr.shoff, image.shoff());

    let names: Vec<&str> = bin.shdr().unwrap().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["", ".text", ".shstrtab"]);
    assert_eq!(bin.phdr().unwrap()[0].memsz, image.len() as u64);
}

#[test]
fn class_hint_must_match_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = sample_elf(tmp.path());

    let mut bin = binary(AllocType::Mmap, BinaryClass::Elf32);
    let err = bin.open_path(&path).unwrap_err();
    assert!(matches!(
        err,
        Error::NativeFailure { code: ResultCode::ClassMismatch, .. }
    ));
    assert_eq!(bin.arch(), BinaryClass::Elf32);
}

#[test]
fn flat_binaries_skip_header_parsing() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(tmp.path(), "boot.bin", &[0xeb, 0xfe, 0x90, 0x90]);

    let mut bin = binary(AllocType::Malloc, BinaryClass::Flat);
    bin.open_path(&path).unwrap();

    assert_eq!(bin.arch(), BinaryClass::Flat);
    assert_eq!(bin.size(), 4);
    assert!(bin.ehdr().is_none());
    assert!(bin.phdr().is_none());
    assert!(bin.shdr().is_none());
    assert_eq!(bin.entry_point(), None);
}

#[test]
fn empty_files_and_directories_are_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let empty = write_file(tmp.path(), "empty", b"");

    let err = Binary::open_file(&empty).unwrap_err();
    assert!(matches!(
        err,
        Error::NativeFailure { code: ResultCode::EmptyFile, .. }
    ));

    let err = Binary::open_file(tmp.path()).unwrap_err();
    assert!(matches!(
        err,
        Error::NativeFailure { code: ResultCode::IsDirectory, .. }
    ));
}

#[test]
fn table_outside_the_file_fails_the_open() {
    let tmp = tempfile::tempdir().unwrap();
    let image = ElfImage::elf64_le(0x401000);
    let mut bytes = image.build();
    bytes.truncate(image.shoff() as usize + 64);
    let path = write_file(tmp.path(), "truncated.elf", &bytes);

    let mut bin = Binary::new();
    let err = bin.open_path(&path).unwrap_err();

    assert_eq!(err.code(), Some(ResultCode::CorruptedTable.code()));
    assert!(!bin.is_open());
    assert_eq!(bin.mem(), None);
    assert!(bin.ehdr().is_none());
}

#[test]
fn bad_header_field_keeps_the_previous_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let path = sample_elf(tmp.path());

    let mut bad_version = ElfImage::elf64_le(0x2000).build();
    bad_version[20] = 7;
    let bad_version = write_file(tmp.path(), "version.elf", &bad_version);

    let mut bad_type = ElfImage::elf64_le(0x2000).build();
    bad_type[16] = 0x42;
    let bad_type = write_file(tmp.path(), "type.elf", &bad_type);

    let mut bin = Binary::new();
    bin.open_path(&path).unwrap();
    let ehdr = bin.ehdr_shared();
    let mem = bin.mem_shared();

    for (bad, expected) in [
        (&bad_version, ResultCode::InvalidVersion),
        (&bad_type, ResultCode::InvalidType),
    ] {
        let err = bin.open_path(bad).unwrap_err();
        match err {
            Error::NativeFailure { code, .. } => assert_eq!(code, expected),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!bin.is_open());
        assert_eq!(bin.ehdr_shared(), ehdr);
        assert_eq!(bin.mem_shared(), mem);
        assert_eq!(bin.fname(), path.to_str());
        assert_eq!(bin.entry_point(), Some(0x401000));
    }
}

#[test]
fn reopening_replaces_every_mirrored_field() {
    let tmp = tempfile::tempdir().unwrap();
    let first = write_file(tmp.path(), "a.elf", &ElfImage::elf64_le(0x1000).build());
    let second = write_file(tmp.path(), "b.elf", &ElfImage::elf32_be(0x2000).build());

    let mut bin = Binary::new();
    bin.open_path(&first).unwrap();
    let old = bin.ehdr_shared().unwrap();

    bin.open_path(&second).unwrap();
    assert_eq!(bin.fname(), second.to_str());
    assert_eq!(bin.entry_point(), Some(0x2000));
    assert_eq!(bin.arch(), BinaryClass::Elf32);
    assert_eq!(bin.size(), ElfImage::elf32_be(0x2000).len());
    assert_eq!(old.entry, 0x1000);
}

#[test]
fn mutating_a_copy_leaves_the_mirror_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let path = sample_elf(tmp.path());
    let bin = Binary::open_file(&path).unwrap();

    let mut copy = bin.mem().unwrap().to_vec();
    copy[0] = 0;
    assert_eq!(bin.mem().unwrap()[0], 0x7f);
}

#[test]
fn constructor_type_errors_surface_as_type_mismatch() {
    let value = serde_json::json!({ "path": 0 });
    let err = BinaryConfig::from_value(value).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch(_)));
}
