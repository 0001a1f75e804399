//! FFmpeg/FFprobe process wrappers.
//!
//! Decoding pipes `rawvideo rgb24` out of `ffmpeg`; encoding pipes raw
//! frames into `ffmpeg` and writes an H.264 MP4.
//!
//! Every child is spawned with `kill_on_drop(true)`, so a caller that
//! abandons the future (e.g. on a stage deadline) also stops the process.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use motionweave_core::frame::Frame;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::codec::{split_rgb_frames, uniform_size, CodecError};

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    pub streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    /// Coded size, before any display rotation.
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub nb_frames: Option<String>,
    /// Older muxers store rotation as `tags.rotate`.
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub side_data_list: Vec<FfprobeSideData>,
}

/// Per-stream side data. Only the display matrix rotation is read.
#[derive(Debug, Deserialize)]
pub struct FfprobeSideData {
    pub rotation: Option<f64>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Whether the `ffmpeg` binary can be executed.
pub async fn check_available() -> Result<(), FfmpegError> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;
    ensure_success(&output)
}

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;
    ensure_success(&output)?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Decode at most `max_frames` frames of a video to RGB, at its display
/// size.
///
/// `ffmpeg` stops reading once the cap is reached, so a long upload is
/// never decoded in full.
pub async fn decode_frames(path: &Path, max_frames: usize) -> Result<Vec<Frame>, FfmpegError> {
    let probe = probe_video(path).await?;
    let (width, height) = display_size(&probe)
        .ok_or_else(|| FfmpegError::ParseError("no video stream with a frame size".into()))?;

    let output = Command::new("ffmpeg")
        .args(decode_args(path, max_frames, width, height))
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;
    ensure_success(&output)?;

    let frames = split_rgb_frames(&output.stdout, width, height)?;
    tracing::debug!(
        path = %path.display(),
        width,
        height,
        max_frames,
        source_fps = parse_framerate(&probe),
        frames = frames.len(),
        "Decoded video",
    );
    Ok(frames)
}

/// Encode `frames` as an H.264/yuv420p MP4 at `fps`.
///
/// Creates the parent directory if needed and overwrites `output_path`.
/// The file only appears at `output_path` once `ffmpeg` has exited
/// successfully; on failure or cancellation nothing is left behind.
pub async fn encode_frames(frames: &[Frame], output_path: &Path, fps: u32) -> Result<(), FfmpegError> {
    encode_with(Command::new("ffmpeg"), frames, output_path, fps).await
}

/// [`encode_frames`] with a caller-built base command.
async fn encode_with(
    mut cmd: Command,
    frames: &[Frame],
    output_path: &Path,
    fps: u32,
) -> Result<(), FfmpegError> {
    let (width, height) = uniform_size(frames)?;

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = PartialFile::beside(output_path);

    // The partial name has no .mp4 extension, so the muxer is explicit.
    let mut child = cmd
        .args(["-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
        .args(["-s", &format!("{width}x{height}")])
        .args(["-r", &fps.to_string()])
        .args(["-i", "pipe:0"])
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"])
        .args(["-f", "mp4"])
        .arg(partial.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(FfmpegError::NotFound)?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| FfmpegError::ParseError("ffmpeg stdin unavailable".into()))?;

    // Feed stdin while draining stderr so neither pipe can fill up.
    let feed = async move {
        for frame in frames {
            stdin.write_all(frame.as_rgb()).await?;
        }
        stdin.shutdown().await
    };
    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output?;
    ensure_success(&output)?;
    fed?;

    partial.persist(output_path).await?;

    tracing::debug!(
        path = %output_path.display(),
        frames = frames.len(),
        fps,
        "Encoded video",
    );
    Ok(())
}

/// Encoder output under a hidden name next to its final path.
///
/// Removed on drop unless [`PartialFile::persist`] renamed it into place.
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl PartialFile {
    fn beside(target: &Path) -> Self {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path: target.with_file_name(format!(".{name}.partial")),
            keep: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(mut self, target: &Path) -> Result<(), FfmpegError> {
        tokio::fs::rename(&self.path, target).await?;
        self.keep = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.keep {
            // Usually already gone when ffmpeg failed before creating it.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Arguments for decoding `path` to raw RGB on stdout.
///
/// The scale filter pins the output to the size the frames are split at,
/// whatever rotation `ffmpeg` applies.
fn decode_args(path: &Path, max_frames: usize, width: u32, height: u32) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-v".into(), "error".into(), "-i".into(), path.into()];
    for arg in [
        "-frames:v".to_string(),
        max_frames.to_string(),
        "-vf".to_string(),
        format!("scale={width}:{height}"),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "pipe:1".to_string(),
    ] {
        args.push(arg.into());
    }
    args
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn ensure_success(output: &std::process::Output) -> Result<(), FfmpegError> {
    if output.status.success() {
        return Ok(());
    }
    Err(FfmpegError::ExecutionFailed {
        exit_code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Find the first video stream in the ffprobe output.
fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Coded frame size of the first video stream.
pub fn video_size(probe: &FfprobeOutput) -> Option<(u32, u32)> {
    let stream = first_video_stream(probe)?;
    match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    }
}

/// Display rotation of a stream in degrees, normalised to `0..360`.
pub fn rotation_degrees(stream: &FfprobeStream) -> u32 {
    let degrees = stream
        .side_data_list
        .iter()
        .find_map(|d| d.rotation)
        .or_else(|| stream.tags.get("rotate").and_then(|r| r.parse::<f64>().ok()))
        .unwrap_or(0.0);
    (degrees.round() as i64).rem_euclid(360) as u32
}

/// Size of the frames `ffmpeg` produces after applying display rotation.
pub fn display_size(probe: &FfprobeOutput) -> Option<(u32, u32)> {
    let (width, height) = video_size(probe)?;
    let stream = first_video_stream(probe)?;
    match rotation_degrees(stream) {
        90 | 270 => Some((height, width)),
        _ => Some((width, height)),
    }
}

/// Frame rate of the first video stream, 0.0 when unknown.
pub fn parse_framerate(probe: &FfprobeOutput) -> f64 {
    first_video_stream(probe)
        .and_then(|s| s.r_frame_rate.as_deref())
        .map(parse_fraction)
        .unwrap_or(0.0)
}

/// Parse a fraction string like `"30/1"` into a float.
fn parse_fraction(s: &str) -> f64 {
    match s.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().unwrap_or(0.0);
            let den = den.parse::<f64>().unwrap_or(0.0);
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        }
        None => s.parse::<f64>().unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(json: &str) -> FfprobeOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parse_fraction_variants() {
        assert!((parse_fraction("30/1") - 30.0).abs() < 0.001);
        assert!((parse_fraction("24000/1001") - 23.976).abs() < 0.01);
        assert!((parse_fraction("25") - 25.0).abs() < 0.001);
        assert_eq!(parse_fraction("30/0"), 0.0);
    }

    #[test]
    fn video_size_uses_first_video_stream() {
        let probe = probe(
            r#"{"streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 720, "height": 1280, "r_frame_rate": "25/1"}
            ]}"#,
        );
        assert_eq!(video_size(&probe), Some((720, 1280)));
        assert!((parse_framerate(&probe) - 25.0).abs() < 0.001);
    }

    #[test]
    fn video_size_missing_without_video_stream() {
        let probe = probe(r#"{"streams": [{"codec_type": "audio"}]}"#);
        assert_eq!(video_size(&probe), None);
        assert_eq!(parse_framerate(&probe), 0.0);
    }

    #[test]
    fn display_size_swaps_for_quarter_turn_matrix() {
        let probe = probe(
            r#"{"streams": [{
                "codec_type": "video", "width": 1920, "height": 1080,
                "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]
            }]}"#,
        );
        assert_eq!(video_size(&probe), Some((1920, 1080)));
        assert_eq!(rotation_degrees(&probe.streams[0]), 270);
        assert_eq!(display_size(&probe), Some((1080, 1920)));
    }

    #[test]
    fn display_size_reads_legacy_rotate_tag() {
        let probe = probe(
            r#"{"streams": [{
                "codec_type": "video", "width": 640, "height": 360,
                "tags": {"rotate": "90", "language": "und"}
            }]}"#,
        );
        assert_eq!(display_size(&probe), Some((360, 640)));
    }

    #[test]
    fn display_size_keeps_upside_down_and_unrotated() {
        let flipped = probe(
            r#"{"streams": [{
                "codec_type": "video", "width": 640, "height": 360,
                "side_data_list": [{"rotation": 180}]
            }]}"#,
        );
        assert_eq!(display_size(&flipped), Some((640, 360)));

        let plain = probe(r#"{"streams": [{"codec_type": "video", "width": 640, "height": 360}]}"#);
        assert_eq!(rotation_degrees(&plain.streams[0]), 0);
        assert_eq!(display_size(&plain), Some((640, 360)));
    }

    #[test]
    fn decode_args_cap_frames_and_pin_size() {
        let args = decode_args(Path::new("/in/ref.mp4"), 25, 1080, 1920);
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "/in/ref.mp4");

        let cap = args.iter().position(|a| a == "-frames:v").unwrap();
        assert!(cap > input, "frame cap must apply to the output");
        assert_eq!(args[cap + 1], "25");

        let filter = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[filter + 1], "scale=1080:1920");
        assert_eq!(args.last().unwrap(), "pipe:1");
    }

    #[tokio::test]
    async fn probe_missing_file_is_video_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = probe_video(&dir.path().join("absent.mp4")).await;
        assert!(matches!(result, Err(FfmpegError::VideoNotFound(_))));
    }

    #[tokio::test]
    async fn encode_rejects_empty_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let result = encode_frames(&[], &dir.path().join("out.mp4"), 25).await;
        assert!(matches!(result, Err(FfmpegError::Codec(CodecError::Empty))));
    }

    // -- Encoder lifecycle, against a shell script standing in for ffmpeg --

    /// A `sh <script>` command; the script's last argument is the output.
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> Command {
        let script = dir.join("fake-ffmpeg.sh");
        std::fs::write(
            &script,
            format!("for last; do :; done\ncat > /dev/null\n{body}\n"),
        )
        .unwrap();
        let mut cmd = Command::new("sh");
        cmd.arg(script);
        cmd
    }

    #[cfg(unix)]
    fn frames() -> Vec<Frame> {
        vec![Frame::solid(2, 2, [10, 20, 30]); 3]
    }

    #[cfg(unix)]
    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n != "fake-ffmpeg.sh")
            .collect();
        names.sort();
        names
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn encode_success_moves_output_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("job.mp4");
        let cmd = fake_ffmpeg(dir.path(), r#"printf encoded > "$last""#);

        encode_with(cmd, &frames(), &output, 25).await.unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"encoded");
        assert_eq!(dir_names(dir.path()), vec!["job.mp4"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn encode_failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("job.mp4");
        let cmd = fake_ffmpeg(dir.path(), "printf half > \"$last\"\nexit 1");

        let result = encode_with(cmd, &frames(), &output, 25).await;

        assert!(matches!(result, Err(FfmpegError::ExecutionFailed { exit_code: Some(1), .. })));
        assert!(dir_names(dir.path()).is_empty(), "{:?}", dir_names(dir.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn encode_abandoned_at_deadline_stops_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("job.mp4");
        let cmd = fake_ffmpeg(dir.path(), "sleep 1\nprintf late > \"$last\"");

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            encode_with(cmd, &frames(), &output, 25),
        )
        .await;
        assert!(result.is_err());

        // Long enough for a surviving encoder to have written its output.
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!output.exists());
        assert!(dir_names(dir.path()).is_empty(), "{:?}", dir_names(dir.path()));
    }
}
