#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use shorts_core::{
    LlmError, LlmResult, MediaBackend, MediaError, MediaResult, Prompter, TextGenerator,
    TextRequest, VideoHandle, VideoPoll, VideoRef, VideoRequest,
};

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::new_rgb8(width, height);
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageOutputFormat::Png)
        .unwrap();
    buffer.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::new_rgb8(width, height);
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageOutputFormat::Jpeg(80))
        .unwrap();
    buffer.into_inner()
}

/// Media backend that fails any request whose prompt mentions one of
/// `failing` and finishes video jobs after `pending_polls` polls.
pub struct FakeMedia {
    pub failing: Vec<String>,
    pub jpeg: bool,
    pub pending_polls: usize,
    pub never_finishes: bool,
    pub speech_bytes: Option<usize>,
    pub images: AtomicUsize,
    pub submissions: Mutex<Vec<VideoRequest>>,
    pub polls: AtomicUsize,
}

impl Default for FakeMedia {
    fn default() -> Self {
        Self {
            failing: Vec::new(),
            jpeg: false,
            pending_polls: 0,
            never_finishes: false,
            speech_bytes: Some(2_160_000),
            images: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
        }
    }
}

impl FakeMedia {
    fn fails(&self, prompt: &str) -> bool {
        self.failing.iter().any(|marker| prompt.contains(marker.as_str()))
    }

    pub fn submissions(&self) -> Vec<VideoRequest> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaBackend for FakeMedia {
    async fn generate_image(&self, prompt: &str) -> MediaResult<Vec<u8>> {
        self.images.fetch_add(1, Ordering::SeqCst);
        if self.fails(prompt) {
            return Err(MediaError::EmptyResponse("image"));
        }
        Ok(if self.jpeg {
            jpeg_bytes(9, 16)
        } else {
            png_bytes(9, 16)
        })
    }

    async fn submit_video(&self, request: VideoRequest) -> MediaResult<VideoHandle> {
        if self.fails(&request.prompt) {
            return Err(MediaError::Status {
                status: 400,
                body: "rejected".into(),
            });
        }
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(request);
        Ok(VideoHandle(format!("operations/{}", submissions.len())))
    }

    async fn poll_video(&self, handle: &VideoHandle) -> MediaResult<VideoPoll> {
        let polls = self.polls.fetch_add(1, Ordering::SeqCst);
        if self.never_finishes || polls < self.pending_polls {
            return Ok(VideoPoll::Pending);
        }
        Ok(VideoPoll::Done(VideoRef(format!("{}/video.mp4", handle.0))))
    }

    async fn download_video(&self, _video: &VideoRef, dest: &Path) -> MediaResult<u64> {
        std::fs::write(dest, b"mp4-bytes").map_err(|source| MediaError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        Ok(9)
    }

    async fn synthesize_speech(&self, _text: &str) -> MediaResult<Vec<u8>> {
        match self.speech_bytes {
            Some(len) => Ok(vec![0u8; len]),
            None => Err(MediaError::EmptyResponse("speech")),
        }
    }
}

/// Answers text requests in order, recording each one.
#[derive(Default)]
pub struct QueuedText {
    answers: Mutex<VecDeque<String>>,
    pub requests: Mutex<Vec<TextRequest>>,
}

impl QueuedText {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<TextRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for QueuedText {
    async fn generate(&self, request: TextRequest) -> LlmResult<String> {
        self.requests.lock().unwrap().push(request);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Operator double with fixed answers that records what it was shown.
pub struct ScriptedPrompter {
    pub confirm: bool,
    pub choice: Option<usize>,
    pub lines: Mutex<Vec<String>>,
    pub questions: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(confirm: bool, choice: Option<usize>) -> Self {
        Self {
            confirm,
            choice,
            lines: Mutex::new(Vec::new()),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    pub fn said(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|line| line.contains(needle))
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    fn say(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    async fn confirm(&self, question: &str) -> bool {
        self.questions.lock().unwrap().push(question.to_string());
        self.confirm
    }

    async fn choose(&self, question: &str, _options: &[String]) -> Option<usize> {
        self.questions.lock().unwrap().push(question.to_string());
        self.choice
    }
}
