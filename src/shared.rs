use std::{
    panic,
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        mpsc::{
            self,
            Receiver,
            Sender,
        },
        Arc,
        Condvar,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    thread::{
        self,
        JoinHandle,
    },
    time::Duration,
};

use log::{
    debug,
    error,
};

use crate::{
    constants,
    display::FrameBuffer,
    emulator::{
        Machine,
        MachineError,
        StepOutcome,
    },
    keypad::KeyState,
};

/// Requests from the host, applied between instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Keys(KeyState),
    Press(u8),
    Release(u8),
    Reset,
    Shutdown,
}

/// A [`Machine`] behind a single lock, so `step()` and `tick()` can run on
/// different threads without seeing each other's half-applied state.
#[derive(Clone)]
pub struct SharedMachine {
    inner: Arc<Mutex<Machine>>,
}

impl SharedMachine {
    pub fn new(machine: Machine) -> Self {
        Self { inner: Arc::new(Mutex::new(machine)) }
    }

    pub fn lock(&self) -> MutexGuard<'_, Machine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Machine) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn step(&self) -> Result<StepOutcome, MachineError> {
        self.lock().step()
    }

    pub fn tick(&self) -> Result<bool, MachineError> {
        self.lock().tick()
    }

    pub fn apply(&self, command: Command) -> Result<(), MachineError> {
        let mut machine = self.lock();
        match command {
            Command::Keys(keys) => machine.set_keys(keys),
            Command::Press(key) => machine.keypad_mut().press(key),
            Command::Release(key) => machine.keypad_mut().release(key),
            Command::Reset => machine.reset()?,
            Command::Shutdown => {}
        }
        Ok(())
    }
}

/// Holds the most recent unread frame; publishing replaces it.
#[derive(Default)]
struct FrameSlot {
    frame: Mutex<Option<FrameBuffer>>,
    ready: Condvar,
}

impl FrameSlot {
    fn lock(&self) -> MutexGuard<'_, Option<FrameBuffer>> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, frame: FrameBuffer) {
        *self.lock() = Some(frame);
        self.ready.notify_all();
    }

    fn take(&self) -> Option<FrameBuffer> {
        self.lock().take()
    }

    fn wait(&self, timeout: Duration) -> Option<FrameBuffer> {
        let (mut frame, _) = self
            .ready
            .wait_timeout_while(self.lock(), timeout, |frame| frame.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        frame.take()
    }
}

/// Drives a machine from two threads: instructions at `ips`, timers at 60 Hz.
pub struct Runner {
    machine: SharedMachine,
    commands: Sender<Command>,
    frames: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
    cpu: JoinHandle<Result<(), MachineError>>,
    timer: JoinHandle<()>,
}

impl Runner {
    pub fn spawn(machine: Machine, ips: u32) -> Self {
        let machine = SharedMachine::new(machine);
        let running = Arc::new(AtomicBool::new(true));
        let (commands, queue) = mpsc::channel();
        let frames = Arc::new(FrameSlot::default());

        let cpu = {
            let machine = machine.clone();
            let running = Arc::clone(&running);
            let frames = Arc::clone(&frames);
            let period = Duration::from_secs_f64(1.0 / ips.max(1) as f64);
            thread::spawn(move || {
                let result = cpu_loop(&machine, &running, &queue, &frames, period);
                running.store(false, Ordering::SeqCst);
                result
            })
        };

        let timer = {
            let machine = machine.clone();
            let running = Arc::clone(&running);
            let period = Duration::from_secs_f64(1.0 / constants::TIMER_HZ as f64);
            thread::spawn(move || {
                while running.load(Ordering::SeqCst) {
                    if let Err(err) = machine.tick() {
                        debug!("timer thread stopping: {err}");
                        break;
                    }
                    thread::sleep(period);
                }
            })
        };

        Self { machine, commands, frames, running, cpu, timer }
    }

    pub fn machine(&self) -> &SharedMachine {
        &self.machine
    }

    pub fn sender(&self) -> Sender<Command> {
        self.commands.clone()
    }

    /// The latest frame published since the last call, if the display changed.
    pub fn take_frame(&self) -> Option<FrameBuffer> {
        self.frames.take()
    }

    /// Like [`Runner::take_frame`], blocking up to `timeout` for a new frame.
    pub fn wait_frame(&self, timeout: Duration) -> Option<FrameBuffer> {
        self.frames.wait(timeout)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops both threads and returns the CPU thread's result.
    pub fn shutdown(self) -> Result<(), MachineError> {
        let _ = self.commands.send(Command::Shutdown);
        let result = join(self.cpu);
        self.running.store(false, Ordering::SeqCst);
        join(self.timer);
        result
    }
}

fn cpu_loop(
    machine: &SharedMachine,
    running: &AtomicBool,
    queue: &Receiver<Command>,
    frames: &FrameSlot,
    period: Duration,
) -> Result<(), MachineError> {
    while running.load(Ordering::SeqCst) {
        for command in queue.try_iter() {
            if command == Command::Shutdown {
                return Ok(());
            }
            machine.apply(command)?;
        }

        {
            let mut guard = machine.lock();
            let outcome = guard.step().inspect_err(|err| error!("cpu thread stopping: {err}"))?;
            if outcome.display_changed {
                frames.publish(guard.frame());
            }
        }

        thread::sleep(period);
    }
    Ok(())
}

fn join<T>(handle: JoinHandle<T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}
