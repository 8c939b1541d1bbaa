//! Graph fixtures for integration tests

use ffgraph_rs::builder::{concat, filter_multi_output, global_args, input, merge_outputs, output};
use ffgraph_rs::{MediaKind, Options, Stream};

/// `input -> reverse -> {trim, trim} -> concat -> output`, the reverse
/// output reused by two trims.
pub fn reverse_trim_concat() -> Stream {
    let reversed = input("A.mp4").vfilter("reverse", Options::new()).unwrap();
    let head = reversed.vfilter("trim", Options::new().with("end", 5)).unwrap();
    let tail = reversed
        .vfilter("trim", Options::new().with("start", 10))
        .unwrap();
    concat(&[head, tail], 2, 1, 0)
        .unwrap()
        .video(0)
        .unwrap()
        .output("out.mp4", Options::new())
        .unwrap()
}

pub fn single_filter() -> Stream {
    input("in.mp4")
        .vfilter("scale", Options::new().with("w", 1280).with("h", -2))
        .unwrap()
        .output("out.mp4", Options::new().with("c:v", "libx264").with("crf", 23))
        .unwrap()
}

/// A filter with video and audio outputs, both used.
pub fn multi_output() -> Stream {
    let a = input("a.mp4");
    let b = input("b.mp4");
    let joined = concat(
        &[
            a.video().unwrap(),
            a.audio().unwrap(),
            b.video().unwrap(),
            b.audio().unwrap(),
        ],
        2,
        1,
        1,
    )
    .unwrap();
    output(
        &[joined.video(0).unwrap(), joined.audio(0).unwrap()],
        "joined.mkv",
        &[],
        Options::new(),
    )
    .unwrap()
}

/// One filter output feeding both inputs of an overlay.
pub fn diamond() -> Stream {
    let scaled = input("in.mp4")
        .vfilter("scale", Options::new().with("w", 640).with("h", 360))
        .unwrap();
    let flipped = scaled.vfilter("hflip", Options::new()).unwrap();
    ffgraph_rs::builder::vfilter(
        &[scaled, flipped],
        "overlay",
        &[MediaKind::Video, MediaKind::Video],
        &[],
        Options::new().with("x", 10).with("y", 10),
    )
    .unwrap()
    .output("pip.mp4", Options::new())
    .unwrap()
}

/// Two outputs from one reused filter, merged into one command.
pub fn merged_outputs() -> Stream {
    let volume = input("talk.wav")
        .audio()
        .unwrap()
        .afilter("volume", Options::new().with("volume", 1.5))
        .unwrap();
    let loud = volume.output("loud.wav", Options::new()).unwrap();
    let echoed = volume
        .afilter("aecho", Options::new().with("in_gain", 0.8))
        .unwrap()
        .output("echo.wav", Options::new())
        .unwrap();
    merge_outputs(&[loud, echoed]).unwrap()
}

/// Global options wrapped around a hand-split graph.
pub fn global_wrapper() -> Stream {
    let src = input("in.mp4").vfilter("fps", Options::new().with("fps", 30)).unwrap();
    let split = filter_multi_output(
        &[src],
        "split",
        &[MediaKind::Video],
        &[MediaKind::Video, MediaKind::Video],
        &["2"],
        Options::new(),
    )
    .unwrap();
    let left = split.video(0).unwrap().output("a.mp4", Options::new()).unwrap();
    let right = split.video(1).unwrap().output("b.mp4", Options::new()).unwrap();
    let both = merge_outputs(&[left, right]).unwrap();
    global_args(
        &[both],
        &["-hide_banner"],
        Options::new().with("loglevel", "error").with("stats", false),
    )
    .unwrap()
}

/// Every fixture, by name.
pub fn corpus() -> Vec<(&'static str, Stream)> {
    vec![
        ("single_filter", single_filter()),
        ("multi_output", multi_output()),
        ("diamond", diamond()),
        ("merged_outputs", merged_outputs()),
        ("global_wrapper", global_wrapper()),
        ("reverse_trim_concat", reverse_trim_concat()),
    ]
}

// ==================== Random graphs ====================

/// One step of a [`RecipeBuilder`].
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Single-input video filter on a pooled video stream.
    Video { src: usize, param: u8 },
    /// Single-input audio filter on a pooled audio stream.
    Audio { src: usize, param: u8 },
    /// Two-input video filter. Both picks may be the same stream.
    Stack { left: usize, right: usize },
    /// Explicit split into two, both outputs pooled.
    Split { src: usize },
}

const VIDEO_FILTERS: &[&str] = &["hflip", "vflip", "scale", "fps"];
const AUDIO_FILTERS: &[&str] = &["volume", "atrim", "aecho"];

/// Replays a list of steps into a graph ending in a single output.
pub struct RecipeBuilder {
    video: Vec<Stream>,
    audio: Vec<Stream>,
}

impl RecipeBuilder {
    pub fn new() -> Self {
        let a = input("a.mp4");
        let b = input("b.mp4");
        Self {
            video: vec![a.video().unwrap(), b.video().unwrap()],
            audio: vec![a.audio().unwrap()],
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        match step {
            Step::Video { src, param } => {
                let name = VIDEO_FILTERS[param as usize % VIDEO_FILTERS.len()];
                let stream = self.video[src % self.video.len()]
                    .vfilter(name, Options::new().with("p", i64::from(param % 3)))
                    .unwrap();
                self.video.push(stream);
            }
            Step::Audio { src, param } => {
                let name = AUDIO_FILTERS[param as usize % AUDIO_FILTERS.len()];
                let stream = self.audio[src % self.audio.len()]
                    .afilter(name, Options::new().with("p", i64::from(param % 3)))
                    .unwrap();
                self.audio.push(stream);
            }
            Step::Stack { left, right } => {
                let left = self.video[left % self.video.len()].clone();
                let right = self.video[right % self.video.len()].clone();
                let stream = ffgraph_rs::builder::vfilter(
                    &[left, right],
                    "hstack",
                    &[MediaKind::Video, MediaKind::Video],
                    &[],
                    Options::new(),
                )
                .unwrap();
                self.video.push(stream);
            }
            Step::Split { src } => {
                let split = self.video[src % self.video.len()].split(2).unwrap();
                self.video.push(split.video(0).unwrap());
                self.video.push(split.video(1).unwrap());
            }
        }
        self
    }

    /// Output the last three video streams and the last audio stream.
    pub fn build(self) -> Stream {
        let mut streams: Vec<Stream> = self.video.iter().rev().take(3).cloned().collect();
        streams.extend(self.audio.last().cloned());
        output(&streams, "out.mkv", &[], Options::new()).unwrap()
    }
}

impl Default for RecipeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a graph from a list of steps.
pub fn from_recipe(steps: &[Step]) -> Stream {
    steps
        .iter()
        .fold(RecipeBuilder::new(), |builder, step| builder.step(*step))
        .build()
}
