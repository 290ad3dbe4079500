use super::generation_store::Generation;
use super::optimisation::methods::base::WindowValidation;
use crate::engines::generation::candidate::Candidate;
use std::sync::mpsc::Sender;

/// Observer of search progress. Every component takes one by `&mut dyn`.
pub trait ProgressCallback: Send {
    fn on_generation_complete(&mut self, generation: &Generation);
    fn on_termination(&mut self, history: &[Generation]);
    fn on_window_validated(&mut self, validation: &WindowValidation);
}

pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_generation_complete(&mut self, generation: &Generation) {
        match generation.best().and_then(Candidate::score) {
            Some(best) if !generation.is_fruitless() => log::info!(
                "Generation {} complete. Best score: {:.4}, viable candidates: {}",
                generation.number(),
                best,
                generation.viable().len()
            ),
            _ => log::info!("Generation {} complete. Fruitless", generation.number()),
        }
    }

    fn on_termination(&mut self, history: &[Generation]) {
        log::info!("Search terminated after {} generations", history.len());
    }

    fn on_window_validated(&mut self, validation: &WindowValidation) {
        log::info!(
            "Window {} validated {}: in-sample {:.4}, out-of-sample {:.4}",
            validation.window.index,
            validation.candidate_id,
            validation.in_sample_score,
            validation.out_of_sample_score
        );
    }
}

/// Forwards events over a channel to another thread
pub struct ChannelProgressCallback {
    sender: Sender<ProgressMessage>,
}

#[derive(Debug, Clone)]
pub enum ProgressMessage {
    GenerationComplete {
        generation: usize,
        candidates: Vec<Candidate>,
        fruitless: bool,
    },
    Terminated {
        history: Vec<Generation>,
    },
    WindowValidated(WindowValidation),
}

impl ChannelProgressCallback {
    pub fn new(sender: Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_complete(&mut self, generation: &Generation) {
        let _ = self.sender.send(ProgressMessage::GenerationComplete {
            generation: generation.number(),
            candidates: generation.viable().to_vec(),
            fruitless: generation.is_fruitless(),
        });
    }

    fn on_termination(&mut self, history: &[Generation]) {
        let _ = self.sender.send(ProgressMessage::Terminated {
            history: history.to_vec(),
        });
    }

    fn on_window_validated(&mut self, validation: &WindowValidation) {
        let _ = self.sender.send(ProgressMessage::WindowValidated(validation.clone()));
    }
}
