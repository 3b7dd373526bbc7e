use rvdebug_image::{parse_file, ProgramImage};
use tracing::info;

use crate::cmd::{parse_word, LinkArgs, LoadArgs, PokeArgs, PokeSeqArgs};
use crate::exit::{image_error, session_error, CliResult, SUCCESS};
use crate::output::{hex32, print_status, OutputFormat};

pub fn reset(link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = link.open()?;
    info!("[TX] R (reset fetch)");
    session
        .reset_fetch()
        .map_err(|err| session_error("reset failed", err))?;
    print_status("reset", &[], format);
    Ok(SUCCESS)
}

pub fn poke(args: PokeArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let addr = parse_word("address", &args.addr)?;
    let data = parse_word("data word", &args.data)?;

    let mut session = link.open()?;
    info!("[TX] P addr=0x{addr:08x} data=0x{data:08x}");
    session
        .program_word(addr, data)
        .map_err(|err| session_error("poke failed", err))?;

    print_status("poke", &[("addr", hex32(addr)), ("data", hex32(data))], format);
    Ok(SUCCESS)
}

pub fn poke_seq(args: PokeSeqArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let base = parse_word("base address", &args.base)?;
    let words = args
        .words
        .iter()
        .map(|token| parse_word("word", token))
        .collect::<CliResult<Vec<u32>>>()?;
    let image =
        ProgramImage::sequence(base, &words).map_err(|err| image_error("poke-seq", err))?;

    let mut session = link.open()?;
    info!("[TX] P(seq) base=0x{base:08x} n={}", image.len());
    let written = session
        .load_image(&image)
        .map_err(|err| session_error("poke-seq failed", err))?;

    print_status(
        "poke-seq",
        &[("base", hex32(base)), ("words", written.to_string())],
        format,
    );
    Ok(SUCCESS)
}

pub fn load(args: LoadArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let image = parse_file(&args.file)
        .and_then(ProgramImage::non_empty)
        .map_err(|err| image_error(&format!("cannot load {}", args.file.display()), err))?;

    let mut session = link.open()?;
    info!(path = %args.file.display(), words = image.len(), "loading program");
    let written = session
        .load_image(&image)
        .map_err(|err| session_error("load failed", err))?;

    if args.reset {
        session
            .reset_fetch()
            .map_err(|err| session_error("reset failed", err))?;
    }

    print_status(
        "load",
        &[
            ("path", args.file.display().to_string()),
            ("words", written.to_string()),
            ("reset", args.reset.to_string()),
        ],
        format,
    );
    Ok(SUCCESS)
}
