use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use fusedata::{format_volume, FolderStore, FsckOptions, DEFAULT_FOLDER, MAX_BLOCKS, ROOT_BLOCK};

fn main() -> Result<()> {
    // 1. Leer la carpeta destino desde los argumentos
    let mut args = env::args().skip(1);
    let folder = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FOLDER));

    if args.next().is_some() {
        return Err(anyhow!("Uso: mkfs_fusedata [carpeta/] (a lo sumo un argumento)"));
    }

    fs::create_dir_all(&folder)
        .with_context(|| format!("No se pudo crear el directorio {:?}", folder))?;

    // 2. Escribir bloques en cero, superblock, lista libre y raíz
    let now = FsckOptions::from_clock().now;
    let mut store = FolderStore::new(&folder);
    format_volume(&mut store, now)
        .with_context(|| format!("No se pudo formatear {:?}", folder))?;

    println!(
        "mkfs_fusedata: volumen creado en {:?} con {} bloques, {} libres.",
        folder,
        MAX_BLOCKS,
        MAX_BLOCKS - ROOT_BLOCK - 1
    );

    Ok(())
}
