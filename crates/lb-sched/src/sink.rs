//! Destinations for dispatched events.

use lb_ir::Event;
use ringbuf::traits::Producer;
use ringbuf::HeapProd;

/// Receives events in dispatch order.
///
/// `dispatch` returns `false` when the event could not be delivered; the
/// scheduler counts it as dropped and carries on.
pub trait EventSink {
    fn dispatch(&mut self, event: Event) -> bool;
}

impl EventSink for Vec<Event> {
    fn dispatch(&mut self, event: Event) -> bool {
        self.push(event);
        true
    }
}

/// Lock-free hand-off into the render context.
impl EventSink for HeapProd<Event> {
    fn dispatch(&mut self, event: Event) -> bool {
        self.try_push(event).is_ok()
    }
}

impl EventSink for crossbeam_channel::Sender<Event> {
    fn dispatch(&mut self, event: Event) -> bool {
        self.try_send(event).is_ok()
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn dispatch(&mut self, event: Event) -> bool {
        (**self).dispatch(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_ir::SourceType;
    use ringbuf::traits::Split;
    use ringbuf::HeapRb;

    #[test]
    fn full_ring_refuses() {
        let (mut prod, _cons) = HeapRb::<Event>::new(1).split();
        assert!(prod.dispatch(Event::new(SourceType::SineOsc, 0.0)));
        assert!(!prod.dispatch(Event::new(SourceType::SineOsc, 0.1)));
    }

    #[test]
    fn bounded_channel_refuses_when_full() {
        let (mut tx, rx) = crossbeam_channel::bounded::<Event>(1);
        assert!(tx.dispatch(Event::new(SourceType::SineOsc, 0.0)));
        assert!(!tx.dispatch(Event::new(SourceType::SineOsc, 0.1)));
        assert_eq!(rx.len(), 1);
    }
}
