use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use colored::*;
use fusedata::{
    ensure_folder, run_fsck, FolderStore, FsckError, FsckOptions, FsckReport, Phase, Severity,
    DEFAULT_FOLDER,
};
use tracing_subscriber::EnvFilter;

/// Código de salida cuando quedaron errores sin corregir.
const EXIT_UNCORRECTED: u8 = 4;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FSCK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "✗ fsck_fusedata:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    // 1. Carpeta con los bloques (opcional, por defecto /fusedata)
    let mut args = env::args().skip(1);
    let folder = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FOLDER));

    if args.next().is_some() {
        return Err(anyhow!("Uso: fsck_fusedata [carpeta/] (a lo sumo un argumento)"));
    }

    ensure_folder(&folder)
        .with_context(|| format!("No se puede usar la carpeta {:?}", folder))?;

    // 2. Ejecutar la pasada completa
    let mut store = FolderStore::new(&folder);
    let options = FsckOptions::from_clock();
    let mut report = FsckReport::new();
    let outcome = run_fsck(&mut store, &options, &mut report);

    println!("\n{}", " FUSEDATA FILESYSTEM CHECK ".on_blue().bold());
    println!("{}", "──────────────────────────────────────────".blue());

    print_phase(&report, Phase::Superblock, "Superblock");
    print_phase(&report, Phase::Tree, "Directorios y archivos");
    print_phase(&report, Phase::FreeList, "Lista libre");

    // El devId equivocado no es un error de E/S: se informa y se corta.
    if let Err(FsckError::WrongDevice { found }) = &outcome {
        println!(
            "\n{} devId = {}, no es el sistema de archivos esperado.\n",
            "✗".red().bold(),
            found
        );
        return Ok(ExitCode::FAILURE);
    }
    outcome.with_context(|| format!("fsck se detuvo en {:?}", folder))?;

    // 3. Resumen final
    println!("\n{}", "Resumen".bold().underline());
    let corrected = report.corrections();
    let uncorrected = report.uncorrectable();

    if report.is_clean() {
        println!("{} Sistema de archivos limpio.\n", "✓ OK".green().bold());
    } else if uncorrected == 0 {
        println!(
            "{} {} correcciones aplicadas.\n",
            "✓ FSCK completado:".yellow().bold(),
            corrected.to_string().yellow()
        );
    } else {
        println!(
            "{} {} correcciones, {} errores sin corregir.\n",
            "✗ FSCK completado con errores:".red().bold(),
            corrected.to_string().yellow(),
            uncorrected.to_string().red()
        );
        return Ok(ExitCode::from(EXIT_UNCORRECTED));
    }

    Ok(ExitCode::SUCCESS)
}

fn print_phase(report: &FsckReport, phase: Phase, title: &str) {
    let mut findings = report.in_phase(phase).peekable();
    if findings.peek().is_none() {
        return;
    }

    println!("\n{}", title.bold().underline());
    for finding in findings {
        match finding.kind.severity() {
            Severity::Ok => println!("  {} {}", "✓".green(), finding),
            Severity::Corrected => println!("  {} {}", "•".yellow(), finding),
            Severity::Uncorrectable => println!("  {} {}", "✗".red(), finding.to_string().red()),
        }
    }
}
