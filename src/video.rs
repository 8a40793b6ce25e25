//! Video frame sampling
//!
//! Decoding sits behind the [`VideoBackend`] / [`VideoDecoder`] traits. The default
//! [`FfmpegBackend`] shells out to `ffprobe` and `ffmpeg`. Tests plug in synthetic decoders.

use image::RgbImage;
use log::{debug, info, warn};
use serde::Deserialize;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use tempfile::TempDir;

use crate::error::{PrepareError, Result};
use crate::utils::{collect_files_with_extensions, create_progress_bar, read_full};

/// A sequential stream of decoded frames.
pub trait VideoDecoder {
    /// Native frame rate reported by the container
    fn native_fps(&self) -> f64;

    /// Total frame count if known, only used for progress reporting
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }

    /// The next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Opens videos for decoding.
pub trait VideoBackend {
    /// Returns `Ok(None)` when the file holds no readable video stream.
    fn open(&self, path: &Path) -> Result<Option<Box<dyn VideoDecoder>>>;
}

/// Number of decoded frames between two kept frames. Never zero.
pub fn sampling_interval(native_fps: f64, frame_rate: u32) -> u64 {
    let fps = if native_fps.is_finite() && native_fps > 0.0 {
        native_fps.floor() as u64
    } else {
        0
    };
    (fps / u64::from(frame_rate.max(1))).max(1)
}

/// Output name of the `index`-th kept frame of a video.
///
/// The stem is used as is so frame names stay distinct across videos and match
/// annotation files named after the video.
pub fn frame_file_name(video_stem: &str, index: usize) -> String {
    format!("{}_frame_{}.jpg", video_stem, index)
}

/// Decode `decoder` to the end and write every `interval`-th frame into `output_dir`.
pub fn sample_frames(
    decoder: &mut dyn VideoDecoder,
    video_stem: &str,
    frame_rate: u32,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let interval = sampling_interval(decoder.native_fps(), frame_rate);
    debug!(
        "Sampling '{}' at {:.2} fps: keeping 1 frame every {}",
        video_stem,
        decoder.native_fps(),
        interval
    );

    let pb = create_progress_bar(decoder.frame_count_hint().unwrap_or(0), video_stem);
    let mut kept = Vec::new();
    let mut position: u64 = 0;
    while let Some(frame) = decoder.next_frame()? {
        if position % interval == 0 {
            let frame_path = output_dir.join(frame_file_name(video_stem, kept.len()));
            frame
                .save(&frame_path)
                .map_err(|source| PrepareError::Image {
                    path: frame_path.clone(),
                    source,
                })?;
            kept.push(frame_path);
        }
        position += 1;
        pb.inc(1);
    }
    pb.finish_and_clear();

    if position == 0 {
        warn!("No readable frames in video '{}'", video_stem);
    }
    Ok(kept)
}

/// Scoped directory holding the frames extracted during one run.
///
/// The directory and everything in it is removed when the workspace is dropped,
/// whether the run succeeded or not.
#[derive(Debug)]
pub struct FrameWorkspace {
    dir: TempDir,
}

impl FrameWorkspace {
    /// Create the workspace inside `parent`, or inside the system temp dir.
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("extracted_frames_");
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(|e| PrepareError::io(parent, e))?;
                builder
                    .tempdir_in(parent)
                    .map_err(|e| PrepareError::io(parent, e))?
            }
            None => builder
                .tempdir()
                .map_err(|e| PrepareError::io(&std::env::temp_dir(), e))?,
        };
        debug!("Extracting frames into {:?}", dir.path());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the workspace now and report failures instead of ignoring them.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| PrepareError::io(&path, e))
    }
}

/// Sample every video in `videos_dir` into `workspace`.
///
/// Returns the extracted frame paths and the number of videos visited.
pub fn extract_video_frames(
    backend: &dyn VideoBackend,
    videos_dir: &Path,
    video_formats: &[String],
    frame_rate: u32,
    workspace: &FrameWorkspace,
) -> Result<(Vec<PathBuf>, usize)> {
    let videos = collect_files_with_extensions(videos_dir, video_formats)?;
    info!("Found {} video(s) in {:?}", videos.len(), videos_dir);

    let mut frames = Vec::new();
    for video in &videos {
        let stem = crate::utils::file_stem(video).unwrap_or_default();
        let Some(mut decoder) = backend.open(video)? else {
            warn!("Could not open video {:?}, skipping it", video);
            continue;
        };
        let extracted = sample_frames(decoder.as_mut(), &stem, frame_rate, workspace.path())?;
        info!("Extracted {} frame(s) from {:?}", extracted.len(), video);
        frames.extend(extracted);
    }
    Ok((frames, videos.len()))
}

/// Decodes through the `ffprobe` and `ffmpeg` executables found on `PATH`.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Parse an ffprobe rational such as `30000/1001` or `25`
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let (num, den) = match raw.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (raw.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 {
        return None;
    }
    let fps = num / den;
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

impl FfmpegBackend {
    fn probe(&self, path: &Path) -> Result<Option<ProbeStream>> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| PrepareError::Decode {
                path: path.to_path_buf(),
                msg: format!("failed to run {:?}: {}", self.ffprobe, e),
            })?;

        if !output.status.success() {
            debug!(
                "ffprobe rejected {:?}: {}",
                path,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        let probe: ProbeOutput =
            serde_json::from_slice(&output.stdout).map_err(|e| PrepareError::Decode {
                path: path.to_path_buf(),
                msg: format!("unreadable ffprobe output: {}", e),
            })?;
        Ok(probe.streams.into_iter().next())
    }
}

impl VideoBackend for FfmpegBackend {
    fn open(&self, path: &Path) -> Result<Option<Box<dyn VideoDecoder>>> {
        let Some(stream) = self.probe(path)? else {
            return Ok(None);
        };
        let (Some(width), Some(height)) = (stream.width, stream.height) else {
            return Ok(None);
        };
        if width == 0 || height == 0 {
            return Ok(None);
        }
        let fps = stream
            .avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
            .unwrap_or(0.0);
        let frame_count = stream.nb_frames.as_deref().and_then(|n| n.parse().ok());

        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PrepareError::Decode {
                path: path.to_path_buf(),
                msg: format!("failed to run {:?}: {}", self.ffmpeg, e),
            })?;
        let stdout = child.stdout.take().ok_or_else(|| PrepareError::Decode {
            path: path.to_path_buf(),
            msg: "ffmpeg stdout was not captured".to_string(),
        })?;

        Ok(Some(Box::new(FfmpegDecoder {
            path: path.to_path_buf(),
            child,
            stdout: BufReader::new(stdout),
            width,
            height,
            fps,
            frame_count,
            finished: false,
        })))
    }
}

/// Raw `rgb24` frames read from an `ffmpeg` child process.
pub struct FfmpegDecoder {
    path: PathBuf,
    child: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    fps: f64,
    frame_count: Option<u64>,
    finished: bool,
}

impl VideoDecoder for FfmpegDecoder {
    fn native_fps(&self) -> f64 {
        self.fps
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.frame_count
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }
        let frame_len = self.width as usize * self.height as usize * 3;
        let mut buf = vec![0u8; frame_len];
        let read = read_full(&mut self.stdout, &mut buf).map_err(|e| PrepareError::Decode {
            path: self.path.clone(),
            msg: e.to_string(),
        })?;

        if read < frame_len {
            if read > 0 {
                warn!(
                    "Truncated frame at the end of {:?} ({} of {} bytes), stopping",
                    self.path, read, frame_len
                );
            }
            self.finished = true;
            return self.check_exit().map(|_| None);
        }
        Ok(RgbImage::from_raw(self.width, self.height, buf))
    }
}

impl FfmpegDecoder {
    // A short stream is only a clean end when ffmpeg itself exited successfully
    fn check_exit(&mut self) -> Result<()> {
        let status = self.child.wait().map_err(|e| PrepareError::Decode {
            path: self.path.clone(),
            msg: format!("failed to wait for ffmpeg: {}", e),
        })?;
        if status.success() {
            return Ok(());
        }
        warn!("ffmpeg stopped early on {:?} ({})", self.path, status);
        Err(PrepareError::Decode {
            path: self.path.clone(),
            msg: format!("ffmpeg exited with {}", status),
        })
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        // ffmpeg may still be writing if the stream was not drained
        if !self.finished {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
