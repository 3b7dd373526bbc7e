use rvdebug_frame::decode_frame;

use crate::cmd::{DecodeArgs, LinkArgs};
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

/// Decode a capture of back-to-back frames, e.g. the output of
/// `rvdebug trace --format raw`.
pub fn run(args: DecodeArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let layout = link.layout()?;
    let bytes = std::fs::read(&args.file)
        .map_err(|err| io_error(&format!("cannot read {}", args.file.display()), err))?;
    let frame_len = layout.frame_len();

    if bytes.is_empty() {
        return Err(frame_error(
            "decode failed",
            rvdebug_frame::FrameError::FrameIncomplete {
                expected: frame_len,
                actual: 0,
            },
        ));
    }

    for (index, chunk) in bytes.chunks(frame_len).enumerate() {
        let frame = decode_frame(chunk, &layout)
            .map_err(|err| frame_error(&format!("frame {index} (offset {})", index * frame_len), err))?;
        print_frame(&frame, format);
    }
    Ok(SUCCESS)
}
