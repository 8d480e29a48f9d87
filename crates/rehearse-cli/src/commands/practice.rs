use std::io::{self, IsTerminal};

use rehearse_core::config::RuntimeConfig;
use rehearse_core::guard::Route;
use rehearse_core::recording::{MediaDevice, RecordingFlow, RecordingStage};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::PracticeArgs;
use crate::commands::common::{authorize, confirm_stdin, prompt_stdin, Authorized};
use crate::device::{CommandCaptureDevice, FileCaptureDevice};
use crate::error::CliError;

pub async fn run_practice(config: &RuntimeConfig, args: PracticeArgs) -> Result<(), CliError> {
    let authorized = authorize(Route::Practice, config).await?;
    let interactive = io::stdin().is_terminal();

    if let Some(path) = args.video.clone() {
        let run = PracticeRun::new(&args, interactive, false);
        run
            .run(FileCaptureDevice::new(path), &authorized)
            .await
    } else if let Some(template) = args.recorder_command.clone() {
        let run = PracticeRun::new(&args, interactive, true);
        run
            .run(CommandCaptureDevice::new(template)?, &authorized)
            .await
    } else {
        Err(CliError::InvalidArgument(
            "Pass --video PATH to submit an existing take, or --recorder-command to capture one"
                .to_string(),
        ))
    }
}

struct PracticeRun<'a> {
    args: &'a PracticeArgs,
    interactive: bool,
    live: bool,
}

impl<'a> PracticeRun<'a> {
    const fn new(args: &'a PracticeArgs, interactive: bool, live: bool) -> Self {
        Self {
            args,
            interactive,
            live,
        }
    }

    async fn run<D: MediaDevice>(
        &self,
        device: D,
        authorized: &Authorized,
    ) -> Result<(), CliError> {
        let mut flow = match self.args.question.as_deref() {
            Some(question) => RecordingFlow::with_question(device, question)?,
            None => RecordingFlow::new(device, self.args.question_type.into()),
        };

        self.choose_question(&mut flow)?;
        self.capture(&mut flow).await?;
        self.review(&mut flow)?;

        loop {
            match flow
                .submit(Some(&authorized.identity), authorized.remote.as_ref())
                .await
            {
                Ok(url) => {
                    println!("Saved your answer. Watch it at {url}");
                    return Ok(());
                }
                Err(error) => {
                    eprintln!("{error}");
                    if !self.interactive || !confirm_stdin("Try saving again?")? {
                        return Err(error.into());
                    }
                }
            }
        }
    }

    fn choose_question<D: MediaDevice>(&self, flow: &mut RecordingFlow<D>) -> Result<(), CliError> {
        loop {
            println!("Question: {}", flow.question());
            if !self.interactive || self.args.question.is_some() {
                return Ok(());
            }
            let answer = prompt_stdin("Press Enter to answer it, or type n for another question: ")?;
            if answer.eq_ignore_ascii_case("n") {
                flow.next_question()?;
            } else {
                return Ok(());
            }
        }
    }

    async fn capture<D: MediaDevice>(&self, flow: &mut RecordingFlow<D>) -> Result<(), CliError> {
        if let Err(error) = flow.start_recording().await {
            if flow.stage() == RecordingStage::DeviceError {
                eprintln!("{}", flow.error().unwrap_or("Could not access camera or microphone"));
            }
            return Err(error.into());
        }
        if self.live {
            wait_for_enter("Recording... press Enter to stop.").await?;
        }
        let recording = flow.stop_recording().await?;
        println!(
            "Captured {} bytes ({:.1}s)",
            recording.len(),
            recording.duration.as_secs_f64()
        );
        Ok(())
    }

    fn review<D: MediaDevice>(&self, flow: &mut RecordingFlow<D>) -> Result<(), CliError> {
        match self.args.rating {
            Some(rating) => {
                flow.set_rating(rating)?;
            }
            None if self.interactive => loop {
                let answer = prompt_stdin("How did it go? Rate yourself 1-5: ")?;
                match answer.parse::<i16>().map_err(|_| ()).and_then(|value| {
                    flow.set_rating(value).map_err(|_| ())
                }) {
                    Ok(_) => break,
                    Err(()) => eprintln!("Please enter a number from 1 to 5."),
                }
            },
            None => {
                return Err(CliError::InvalidArgument(
                    "Please rate your answer with --rating 1-5".to_string(),
                ))
            }
        }

        match self.args.notes.clone() {
            Some(notes) => flow.set_notes(notes)?,
            None if self.interactive => {
                flow.set_notes(prompt_stdin("Notes (optional): ")?)?;
            }
            None => {}
        }
        Ok(())
    }
}

async fn wait_for_enter(prompt: &str) -> Result<(), CliError> {
    eprintln!("{prompt}");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(())
}
