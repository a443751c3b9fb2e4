use state_machines::state_machine;

state_machine! {
    name: ArchiveMachine,
    state: ArchiveState,
    initial: Open,
    states: [Open, Streaming, Drained, Aborted, Closed],
    events {
        stream { transition: { from: Open, to: Streaming } }
        drain { transition: { from: Streaming, to: Drained } }
        abort { transition: { from: Streaming, to: Aborted } }
        close {
            transition: { from: Drained, to: Closed }
            transition: { from: Aborted, to: Closed }
        }
    }
}

pub fn opened() -> ArchiveMachine<(), Open> {
    ArchiveMachine::new(())
}
