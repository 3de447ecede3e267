mod retry_circuit;
