/// Installs a panic hook that logs the panic through `tracing` before running
/// the default hook, so panics end up in the same log stream as everything
/// else.
pub fn install() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("thread panicked: {info}");
        default_hook(info);
    }));
}
