use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context as AnyhowContext, Result};
use cv2::prelude::*;
use indicatif::ProgressStyle;
use log::{error, info, warn};
use opencv as cv2;
use rerun::{RecordingStream, RecordingStreamBuilder};
use tracing::{info_span, instrument, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::classifier::{vote, Action, Classifier, SvmClassifier};
use crate::config::Config;
use crate::feature::FeatureVector;
use crate::tracker::Tracker;
use crate::video::{FrameSource, VideoInput};
use crate::visualization::{bgr_to_rgb_array, draw_trajectories};

const ESC_KEY: i32 = 27;

/// Video paths, one per line. Blank lines are skipped.
pub fn read_jobs(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("cannot open job list {}", path.display()))?;
    let mut jobs = vec![];
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            jobs.push(line.to_owned());
        }
    }
    Ok(jobs)
}

/// Opens the video of one job.
pub type OpenVideo<'a> = dyn FnMut(&str) -> Result<Box<dyn FrameSource>> + 'a;

fn open_video_file(job: &str) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(VideoInput::open(Path::new(job))?))
}

/// Run a fresh tracker over every frame of `source`.
#[instrument(skip_all)]
pub fn extract_features(source: &mut dyn FrameSource, config: &Config) -> Result<Vec<FeatureVector>> {
    let span = Span::current();
    span.pb_set_style(&ProgressStyle::default_bar());
    if let Some(count) = source.frame_count() {
        span.pb_set_length(count);
    }

    let mut tracker = Tracker::new(config.clone())?;
    while let Some(image) = source.next_frame()? {
        tracker
            .process(image)
            .with_context(|| format!("frame {}", tracker.frame_number() + 1))?;
        span.pb_inc(1);
    }
    info!(
        "{} frames, {} feature vectors",
        tracker.frame_number(),
        tracker.features().len()
    );
    Ok(tracker.into_features())
}

/// Majority vote of the classifier over the video's feature vectors.
pub fn recognize_video(
    source: &mut dyn FrameSource,
    classifier: &dyn Classifier,
    config: &Config,
) -> Result<Action> {
    let features = extract_features(source, config)?;
    let predictions = features
        .iter()
        .map(|feature| classifier.predict(feature))
        .collect::<Result<Vec<_>>>()?;
    Ok(vote(predictions))
}

/// What happened to one video of a recognition run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Recognized(Action),
    CannotOpen,
    /// Opened, but decoding or tracking stopped with an error.
    Failed,
}

/// One line of the recognition report.
pub fn report_line(job: &str, outcome: Outcome) -> String {
    match outcome {
        Outcome::Recognized(action) => format!("{job} -> {action}"),
        Outcome::CannotOpen => format!("Error: Cannot open {job} !"),
        Outcome::Failed => format!("Error: Cannot process {job} !"),
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecognitionSummary {
    /// Videos that could be opened and processed
    pub processed: usize,
    /// Processed videos whose ground truth is known from the path
    pub evaluated: usize,
    pub correct: usize,
    /// Videos that could not be opened or failed midway
    pub failed: usize,
}

impl RecognitionSummary {
    pub fn record(&mut self, truth: Action, predicted: Action) {
        self.processed += 1;
        if truth != Action::Unrecognized {
            self.evaluated += 1;
            if truth == predicted {
                self.correct += 1;
            }
        }
    }

    /// Percentage of correct evaluated videos.
    pub fn accuracy(&self) -> Option<f64> {
        if self.evaluated == 0 {
            None
        } else {
            Some(100. * self.correct as f64 / self.evaluated as f64)
        }
    }
}

/// Classify every job, one report line each. A video that cannot be opened
/// or processed is reported and skipped.
pub fn recognize_jobs(
    jobs: &[String],
    open: &mut OpenVideo,
    classifier: &dyn Classifier,
    config: &Config,
    report: &mut dyn Write,
) -> Result<RecognitionSummary> {
    let mut summary = RecognitionSummary::default();
    for job in jobs {
        let _span = info_span!("recognize", video = job.as_str()).entered();
        let outcome = match open(job) {
            Ok(mut video) => match recognize_video(video.as_mut(), classifier, config) {
                Ok(predicted) => {
                    summary.record(Action::from_path(job), predicted);
                    Outcome::Recognized(predicted)
                }
                Err(err) => {
                    error!("{job}: {err:#}");
                    summary.failed += 1;
                    Outcome::Failed
                }
            },
            Err(err) => {
                error!("{err:#}");
                summary.failed += 1;
                Outcome::CannotOpen
            }
        };
        let line = report_line(job, outcome);
        writeln!(report, "{line}")?;
        info!("{line}");
    }
    Ok(summary)
}

/// Classify every video of the job list, writing `<path> -> <action>` lines
/// to the report.
pub fn recognize(jobs_path: &Path, report_path: &Path, model_path: &Path, config: &Config) -> Result<RecognitionSummary> {
    let classifier = SvmClassifier::load(model_path)?;
    let jobs = read_jobs(jobs_path)?;
    let report = File::create(report_path)
        .with_context(|| format!("cannot create report {}", report_path.display()))?;
    let mut report = BufWriter::new(report);

    info!("Recognizing {} videos", jobs.len());
    let summary = recognize_jobs(&jobs, &mut open_video_file, &classifier, config, &mut report)?;
    report.flush()?;

    info!("Results have been saved to {}", report_path.display());
    if summary.failed > 0 {
        warn!("{} of {} videos could not be recognized", summary.failed, jobs.len());
    }
    match summary.accuracy() {
        Some(accuracy) => info!("Overall accuracy: {accuracy:.2} %"),
        None => warn!("No video with a known action, accuracy is not available"),
    }
    Ok(summary)
}

/// Feature vectors and labels of every trainable video.
#[derive(Debug, Default)]
pub struct TrainingSet {
    pub vectors: Vec<FeatureVector>,
    pub labels: Vec<Action>,
    pub videos: usize,
}

impl TrainingSet {
    pub fn add(&mut self, label: Action, vectors: Vec<FeatureVector>) {
        self.labels.extend(std::iter::repeat(label).take(vectors.len()));
        self.vectors.extend(vectors);
        self.videos += 1;
    }
}

/// Features of every labelled job. Unlabelled, unopenable and failing videos
/// are logged and left out.
pub fn collect_training_set(jobs: &[String], open: &mut OpenVideo, config: &Config) -> TrainingSet {
    let mut training_set = TrainingSet::default();
    for job in jobs {
        let _span = info_span!("extract", video = job.as_str()).entered();
        let label = Action::from_path(job);
        if label == Action::Unrecognized {
            error!("Unrecognized action label of {job}");
            continue;
        }
        let mut video = match open(job) {
            Ok(video) => video,
            Err(err) => {
                error!("{err:#}");
                continue;
            }
        };
        info!("Extracting features from {job}");
        match extract_features(video.as_mut(), config) {
            Ok(vectors) => training_set.add(label, vectors),
            Err(err) => error!("{job}: {err:#}"),
        }
    }
    training_set
}

/// Extract features from every labelled video of the job list, train the SVM
/// and save it.
pub fn train(jobs_path: &Path, model_path: &Path, config: &Config) -> Result<TrainingSet> {
    let jobs = read_jobs(jobs_path)?;
    let training_set = collect_training_set(&jobs, &mut open_video_file, config);

    info!(
        "Training on {} feature vectors from {} videos",
        training_set.vectors.len(),
        training_set.videos
    );
    let mut classifier = SvmClassifier::new()?;
    classifier.train(&training_set.vectors, &training_set.labels)?;
    classifier.save(model_path)?;
    info!("Training data has been saved to {}", model_path.display());
    Ok(training_set)
}

/// Play every video with its trajectories drawn on top. ESC stops the whole
/// run. Overlays are also logged to a rerun recording when `record` is set.
pub fn show(jobs_path: &Path, config: &Config, record: Option<&Path>) -> Result<()> {
    let jobs = read_jobs(jobs_path)?;
    let recorder: Option<RecordingStream> = match record {
        Some(path) => Some(RecordingStreamBuilder::new("motion-trajectories").save(path)?),
        None => None,
    };

    info!("Press ESC to stop the video output");
    for job in &jobs {
        let mut video = match VideoInput::open(Path::new(job)) {
            Ok(video) => video,
            Err(err) => {
                error!("{err:#}");
                continue;
            }
        };
        let delay = (1000. / video.fps()).round().max(1.) as i32;
        let mut tracker = Tracker::new(config.clone())?;
        cv2::highgui::named_window(job, cv2::highgui::WINDOW_AUTOSIZE)?;

        loop {
            let processed = match video.next_frame() {
                Ok(Some(image)) => tracker.process(image).map_err(anyhow::Error::from),
                Ok(None) => break,
                Err(err) => Err(err),
            };
            if let Err(err) = processed {
                error!("{job}: {err:#}");
                break;
            }
            let mut output = video.color_frame().try_clone()?;
            draw_trajectories(&mut output, tracker.trajectories())?;
            cv2::highgui::imshow(job, &output)?;

            if let Some(recorder) = &recorder {
                recorder.set_time_sequence("frame", tracker.frame_number() as i64);
                recorder.log("video/trajectories", &rerun::Image::try_from(bgr_to_rgb_array(&output)?)?)?;
            }

            if cv2::highgui::wait_key(delay)? == ESC_KEY {
                cv2::highgui::destroy_window(job)?;
                info!("Video output has been terminated by user");
                return Ok(());
            }
        }
        cv2::highgui::destroy_window(job)?;
    }
    info!("Video output completed");
    Ok(())
}
