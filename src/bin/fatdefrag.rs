//! Command-line front-end: resolve a path on a FAT image, report whether it
//! is fragmented, and defragment it.
//!
//! Thin dispatcher only: argument parsing, opening the partition, and
//! formatting output. No on-disk-format logic lives here.

use clap::{Arg, Command};
use fatdefrag::{FileKind, Partition};

fn main() {
    env_logger::init();

    let matches = Command::new("fatdefrag")
        .about("Offline defragmenter for FAT12/16/32 volumes")
        .subcommand_required(true)
        .subcommand(
            Command::new("info")
                .about("Resolve a path and print its FileInfo")
                .arg(Arg::new("image").required(true))
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(
            Command::new("check")
                .about("Report whether a path is fragmented")
                .arg(Arg::new("image").required(true))
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(
            Command::new("defrag")
                .about("Defragment a path (a directory defragments its contents)")
                .arg(Arg::new("image").required(true))
                .arg(Arg::new("path").required(true)),
        )
        .get_matches();

    let result = match matches.subcommand() {
        Some(("info", sub)) => run_info(sub),
        Some(("check", sub)) => run_check(sub),
        Some(("defrag", sub)) => run_defrag(sub),
        _ => unreachable!("clap enforces subcommand_required"),
    };

    if let Err(code) = result {
        std::process::exit(code);
    }
}

fn open(sub: &clap::ArgMatches) -> Result<(Partition, String), i32> {
    let image = sub.get_one::<String>("image").expect("required");
    let path = sub.get_one::<String>("path").expect("required").clone();
    let partition = Partition::open(image).map_err(|e| {
        eprintln!("fatdefrag: {e}");
        2
    })?;
    Ok((partition, path))
}

fn run_info(sub: &clap::ArgMatches) -> Result<(), i32> {
    let (mut partition, path) = open(sub)?;
    let file = partition.get_file(&path).map_err(|e| {
        eprintln!("fatdefrag: {e}");
        2
    })?;
    if file.kind == FileKind::None {
        eprintln!("fatdefrag: '{path}' not found");
        return Err(1);
    }
    partition.print_file_info(&file);
    Ok(())
}

fn run_check(sub: &clap::ArgMatches) -> Result<(), i32> {
    let (mut partition, path) = open(sub)?;
    let file = partition.get_file(&path).map_err(|e| {
        eprintln!("fatdefrag: {e}");
        2
    })?;
    if file.kind == FileKind::None {
        eprintln!("fatdefrag: '{path}' not found");
        return Err(1);
    }
    let fragments = partition.is_file_fragmented(&file);
    if fragments == 0 {
        println!("'{path}' is contiguous");
    } else {
        println!("'{path}' is fragmented across {fragments} run(s)");
    }
    Ok(())
}

fn run_defrag(sub: &clap::ArgMatches) -> Result<(), i32> {
    let (mut partition, path) = open(sub)?;
    let mut file = partition.get_file(&path).map_err(|e| {
        eprintln!("fatdefrag: {e}");
        2
    })?;
    if file.kind == FileKind::None {
        eprintln!("fatdefrag: '{path}' not found");
        return Err(1);
    }
    let relocated = partition.defragment(&mut file).map_err(|e| {
        eprintln!("fatdefrag: {e}");
        2
    })?;
    println!("relocated {relocated} file(s)");
    Ok(())
}
