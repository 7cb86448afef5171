#![forbid(unsafe_code)]

use inquire::{Confirm, InquireError, Select, Text};
use std::path::PathBuf;
use tailpak::pak;

fn prompt_err(e: InquireError) -> pak::PakError {
    pak::PakError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

fn validate_dir(p: &str) -> Result<(), String> {
    let pb = PathBuf::from(p);
    if !pb.exists() {
        return Err("Path does not exist".to_string());
    }
    if !pb.is_dir() {
        return Err("Path is not a directory".to_string());
    }
    Ok(())
}

fn validate_file(p: &str) -> Result<(), String> {
    let pb = PathBuf::from(p);
    if !pb.exists() {
        return Err("Path does not exist".to_string());
    }
    if !pb.is_file() {
        return Err("Path is not a file".to_string());
    }
    Ok(())
}

fn validate_output(p: &str) -> Result<(), String> {
    if p.trim().is_empty() {
        return Err("Output path is empty".to_string());
    }
    Ok(())
}

/// Ask until `check` accepts the answer.
fn prompt_path(
    label: &str,
    default: &str,
    check: fn(&str) -> Result<(), String>,
) -> pak::PakResult<PathBuf> {
    loop {
        let answer = Text::new(label)
            .with_default(default)
            .prompt()
            .map_err(prompt_err)?;
        let answer = answer.trim();
        match check(answer) {
            Ok(()) => return Ok(PathBuf::from(answer)),
            Err(msg) => println!("  {msg}"),
        }
    }
}

fn confirm() -> pak::PakResult<bool> {
    Confirm::new("Proceed?")
        .with_default(true)
        .prompt()
        .map_err(prompt_err)
}

pub fn run() -> pak::PakResult<()> {
    println!("tailpak wizard\n");

    let mode = Select::new("Mode", vec!["pack", "extract"])
        .prompt()
        .map_err(prompt_err)?;

    if mode == "pack" {
        let source = prompt_path("Base file (executable)", "./app", validate_file)?;
        let data = prompt_path("Directory to attach", "./data", validate_dir)?;
        let dest = prompt_path("Output file", "./app-packed", validate_output)?;

        println!("\nPack summary:");
        println!("  base   : {}", source.display());
        println!("  data   : {}", data.display());
        println!("  output : {}", dest.display());

        if !confirm()? {
            return Ok(());
        }
        crate::run_pack(source, dest, data)
    } else {
        let source = prompt_path("Packed file", "./app-packed", validate_file)?;
        let dest = prompt_path("Output directory (will be wiped)", "./extracted", validate_output)?;

        println!("\nExtract summary:");
        println!("  packed : {}", source.display());
        println!("  output : {}", dest.display());

        if !confirm()? {
            return Ok(());
        }
        crate::run_extract(dest, Some(source))
    }
}
